//! Audio subsystem module

pub mod device;
pub mod dispatcher;
pub mod playback;
pub mod sound;

pub use device::{get_output_device, list_output_devices};
pub use dispatcher::{CueDispatcher, DispatchReport};
pub use playback::{gain_to_amplitude, AudioSink, CpalSink};
pub use sound::{list_sound_files, SoundBank, SoundClip, SoundDecoder, WavDecoder};
