use thiserror::Error;

/// Errors this binary itself can raise, on top of the library's own
/// [`notecore_module::ModuleError`] — file I/O and JSON parsing are the
/// CLI's concern, not the library's (the library performs no
/// I/O at all).
#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error("could not read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is not valid module JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Module(#[from] notecore_module::ModuleError),

    #[error(
        "unknown property '{0}'; expected one of t/startTime, d/duration, \
         f/frequency, tempo, bpm/beatsPerMeasure, ml/measureLength"
    )]
    UnknownProperty(String),
}
