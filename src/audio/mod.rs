/*!
 * Local audio artifacts.
 *
 * - `filename`: deterministic per-paragraph audio filenames
 * - `library`: the on-disk directory tree holding generated audio
 * - `probe`: non-blocking detection of already present audio files
 */

pub mod filename;
pub mod library;
pub mod probe;

pub use self::filename::{build_filename, preferred_cache_key, FileName};
pub use self::library::AudioLibrary;
pub use self::probe::{AudioHandle, AudioProbe, FsAudioProbe, ProbeOutcome};
