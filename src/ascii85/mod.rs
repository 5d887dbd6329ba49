pub mod core;


pub use self::core::{
    DecodeError, decode_stream, decode_to_writer, encode_stream, encode_to_writer,
};
