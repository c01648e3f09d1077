//! Names of the bundled native libraries

/// Primary audio engine
pub const ENGINE: &str = "bass";

/// Tempo (BPM) analysis add-on
pub const TEMPO_ADDON: &str = "bass_fx";

/// Loudness (EBU R128) analysis add-on
pub const LOUDNESS_ADDON: &str = "bassloud";

/// Exclusive-mode output subsystem
pub const EXCLUSIVE_OUTPUT: &str = "basswasapi";

/// Format plugins shipped with the application
pub const FORMAT_PLUGINS: &[&str] = &[
    "bass_aac", // AAC / MP4
    "bass_mpc", // Musepack
    "bassalac", // Apple Lossless
    "bass_ape", // Monkey's Audio
    "bassflac",
    "bassopus",
    "basswebm", // WebM / Opus
    "basswv",   // WavPack
];

/// Platform file name for a library stem
///
/// `bassflac` becomes `bassflac.dll`, `libbassflac.dylib` or `libbassflac.so`.
pub fn file_name(stem: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.dll", stem)
    } else if cfg!(target_os = "macos") {
        format!("lib{}.dylib", stem)
    } else {
        format!("lib{}.so", stem)
    }
}

/// Library stem for a platform file name (inverse of [`file_name`])
pub fn stem(file_name: &str) -> &str {
    let base = file_name
        .rsplit_once('.')
        .map_or(file_name, |(base, _ext)| base);
    if cfg!(target_os = "windows") {
        base
    } else {
        base.strip_prefix("lib").unwrap_or(base)
    }
}

/// Canonical catalog key for a library file name
pub fn canonical(name: &str) -> String {
    name.to_lowercase()
}

/// Every library the application bundles, as platform file names
pub fn bundled() -> Vec<String> {
    [ENGINE, TEMPO_ADDON, LOUDNESS_ADDON, EXCLUSIVE_OUTPUT]
        .iter()
        .chain(FORMAT_PLUGINS)
        .map(|stem| file_name(stem))
        .collect()
}
