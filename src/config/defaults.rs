//! Named defaults and limits shared by CLI parsing and validation.

use crate::audio::ThresholdProfile;

pub const DEFAULT_TICK_MS: u64 = 100;
pub const MIN_TICK_MS: u64 = 20;
pub const MAX_TICK_MS: u64 = 1_000;

pub const DEFAULT_SILENCE_HOLD_MS: u64 = 1_500;
pub const MIN_SILENCE_HOLD_MS: u64 = 200;
pub const MAX_SILENCE_HOLD_MS: u64 = 30_000;

pub const DEFAULT_MIN_SPEECH_MS: u64 = 500;
pub const MIN_MIN_SPEECH_MS: u64 = 50;
pub const MAX_MIN_SPEECH_MS: u64 = 10_000;

pub const DEFAULT_NOISE_WINDOW: usize = 50;
pub const MAX_NOISE_WINDOW: usize = 1_000;

pub const DEFAULT_PRE_ROLL_MS: u64 = 500;
pub const MAX_PRE_ROLL_MS: u64 = 5_000;

pub const DEFAULT_MIN_SEGMENT_BYTES: usize = 1_000;
pub const MAX_MIN_SEGMENT_BYTES: usize = 1_000_000;

pub const DEFAULT_MIC_BASE_THRESHOLD: f32 = ThresholdProfile::MIC.base;
pub const DEFAULT_MIC_NOISE_MARGIN: f32 = ThresholdProfile::MIC.margin;
pub const DEFAULT_SYSTEM_BASE_THRESHOLD: f32 = ThresholdProfile::SYSTEM.base;
pub const DEFAULT_SYSTEM_NOISE_MARGIN: f32 = ThresholdProfile::SYSTEM.margin;
/// Levels are byte-scale, so thresholds and margins live in 0..=255.
pub const MAX_LEVEL_BYTE: f32 = 255.0;

pub const DEFAULT_GAIN: f32 = 1.0;
pub const MAX_GAIN: f32 = 4.0;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;
pub const MIN_CHANNEL_CAPACITY: usize = 8;
pub const MAX_CHANNEL_CAPACITY: usize = 1_024;

pub const DEFAULT_QUEUE_DEPTH: usize = 8;
pub const MAX_QUEUE_DEPTH: usize = 64;

pub const DEFAULT_WHISPER_CMD: &str = "whisper-cli";
pub const DEFAULT_LANG: &str = "en";
/// Caps for user-supplied extra whisper arguments, to keep argv small.
pub const MAX_WHISPER_EXTRA_ARGS: usize = 32;
pub const MAX_WHISPER_ARG_BYTES: usize = 8 * 1024;

pub const MAX_TEMPERATURE: f64 = 2.0;

/// Filenames probed when --whisper-model is not supplied.
pub const WHISPER_MODEL_DIR: &str = "whisper_models";

/// ISO-639-1 primary language codes accepted by --lang.
pub const ISO_639_1_CODES: &[&str] = &[
    "aa", "ab", "ae", "af", "ak", "am", "an", "ar", "as", "av", "ay", "az", "ba", "be", "bg", "bh",
    "bi", "bm", "bn", "bo", "br", "bs", "ca", "ce", "ch", "co", "cr", "cs", "cu", "cv", "cy", "da",
    "de", "dv", "dz", "ee", "el", "en", "eo", "es", "et", "eu", "fa", "ff", "fi", "fj", "fo", "fr",
    "fy", "ga", "gd", "gl", "gn", "gu", "gv", "ha", "he", "hi", "ho", "hr", "ht", "hu", "hy", "hz",
    "ia", "id", "ie", "ig", "ii", "ik", "io", "is", "it", "iu", "ja", "jv", "ka", "kg", "ki", "kj",
    "kk", "kl", "km", "kn", "ko", "kr", "ks", "ku", "kv", "kw", "ky", "la", "lb", "lg", "li", "ln",
    "lo", "lt", "lu", "lv", "mg", "mh", "mi", "mk", "ml", "mn", "mr", "ms", "mt", "my", "na", "nb",
    "nd", "ne", "ng", "nl", "nn", "no", "nr", "nv", "ny", "oc", "oj", "om", "or", "os", "pa", "pi",
    "pl", "ps", "pt", "qu", "rm", "rn", "ro", "ru", "rw", "sa", "sc", "sd", "se", "sg", "si", "sk",
    "sl", "sm", "sn", "so", "sq", "sr", "ss", "st", "su", "sv", "sw", "ta", "te", "tg", "th", "ti",
    "tk", "tl", "tn", "to", "tr", "ts", "tt", "tw", "ty", "ug", "uk", "ur", "uz", "ve", "vi", "vo",
    "wa", "wo", "xh", "yi", "yo", "za", "zh", "zu",
];
