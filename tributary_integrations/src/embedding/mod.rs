#[cfg(feature = "local_text2vec")]
pub mod local_text2vec;
