pub mod classifier;
pub mod compositor;
pub mod orchestrator;
pub mod storage;
pub mod watermark_source;

#[cfg(test)]
pub(crate) mod http_stub;
