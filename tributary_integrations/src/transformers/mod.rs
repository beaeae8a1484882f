pub mod text_chunker;
