//! Speech-to-text: the recognition and alignment seams and their Whisper
//! implementation.

pub mod align;
pub mod recognizer;
pub mod whisper;
