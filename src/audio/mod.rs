pub mod file;
pub mod input;
pub mod pcm;
pub mod wav;

pub use file::AudioFile;
pub use input::{InputFactory, InputSource, ToneInput, WavFileInput};
pub use pcm::{PcmEncoder, PcmStream, SpectrumAnalyser};
pub use wav::encode_wav;
