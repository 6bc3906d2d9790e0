use mapping_datatypes::Classification;
use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error kinds the engine surfaces (spec §7). Values, not
/// exception-unwinding: every operation either succeeds or returns one of
/// these.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[snafu(context(suffix(false)))]
pub enum Error {
    #[snafu(display("configuration error: {reason}"))]
    ConfigError { reason: String },

    #[snafu(display("invalid argument: {reason}"))]
    ArgumentError { reason: String },

    #[snafu(display("backend error: {source}"))]
    BackendError { source: mapping_backends::Error },

    #[snafu(display("no raster covers the requested time"))]
    NoRasterForGivenTime,

    #[snafu(display("tile did not decode: {reason}"))]
    CodecError { reason: String },

    #[snafu(display("write attempted against a read-only handle"))]
    ReadOnly,

    #[snafu(display("internal invariant violated: {reason}"))]
    MustNotHappen { reason: String },

    #[snafu(display("requested CRS does not match the dataset CRS"))]
    CrsMismatch,

    #[snafu(display("no stored tile overlaps the requested window"))]
    NoTiles,

    #[snafu(display("data model error: {source}"))]
    DataType { source: mapping_datatypes::Error },

    #[snafu(display("malformed descriptor json: {source}"))]
    Json { source: serde_json::Error },

    #[snafu(display("i/o error: {source}"))]
    Io { source: std::io::Error },

    #[snafu(display("configuration load error: {source}"))]
    ConfigLoad { source: config::ConfigError },
}

impl Error {
    pub fn classification(&self) -> Classification {
        match self {
            Error::BackendError { source } => source.classification(),
            Error::DataType { .. } => Classification::Permanent,
            Error::ConfigError { .. }
            | Error::ArgumentError { .. }
            | Error::CodecError { .. }
            | Error::ReadOnly
            | Error::CrsMismatch
            | Error::NoTiles
            | Error::NoRasterForGivenTime
            | Error::Json { .. }
            | Error::ConfigLoad { .. } => Classification::Permanent,
            Error::Io { .. } => Classification::Transient,
            Error::MustNotHappen { .. } => Classification::Confidential,
        }
    }
}

impl From<mapping_backends::Error> for Error {
    fn from(source: mapping_backends::Error) -> Self {
        Error::BackendError { source }
    }
}

impl From<mapping_datatypes::Error> for Error {
    fn from(source: mapping_datatypes::Error) -> Self {
        Error::DataType { source }
    }
}
