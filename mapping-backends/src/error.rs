use mapping_datatypes::Classification;
use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Storage-layer failures surfaced by `RasterBackend` / `FeatureBackend`
/// implementations (spec §4.1, §7 `BackendError`).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[snafu(context(suffix(false)))]
pub enum Error {
    #[snafu(display("sqlite backend error: {source}"))]
    Sqlite { source: rusqlite::Error },

    #[snafu(display("sqlite pool error: {source}"))]
    Pool { source: r2d2::Error },

    #[snafu(display("i/o error at {path}: {source}"))]
    Io { path: String, source: std::io::Error },

    #[snafu(display("malformed descriptor json: {source}"))]
    Json { source: serde_json::Error },

    #[snafu(display("no raster on channel {channel} covers t={t}"))]
    NoRasterForGivenTime { channel: usize, t: i64 },

    #[snafu(display("codec tag {tag} is not registered"))]
    UnknownCodec { tag: u8 },

    #[snafu(display("tile payload does not decode at {width}x{height}: {reason}"))]
    Codec { width: u32, height: u32, reason: String },

    #[snafu(display("dataset ({owner}, {name}) already exists"))]
    DuplicateDataset { owner: String, name: String },

    #[snafu(display("no dataset named ({owner}, {name})"))]
    UnknownDataset { owner: String, name: String },

    #[snafu(display("write attempted against a read-only handle"))]
    ReadOnly,

    #[snafu(display("no backend registered under the name {name}"))]
    UnknownBackend { name: String },

    #[snafu(display("data model error: {source}"))]
    DataType { source: mapping_datatypes::Error },
}

impl Error {
    pub fn classification(&self) -> Classification {
        match self {
            Error::Sqlite { .. } | Error::Pool { .. } | Error::Io { .. } => Classification::Transient,
            Error::NoRasterForGivenTime { .. } | Error::UnknownDataset { .. } | Error::DuplicateDataset { .. } => {
                Classification::Permanent
            }
            Error::Json { .. }
            | Error::UnknownCodec { .. }
            | Error::Codec { .. }
            | Error::ReadOnly
            | Error::UnknownBackend { .. } => Classification::Permanent,
            Error::DataType { .. } => Classification::Permanent,
        }
    }
}

impl From<mapping_datatypes::Error> for Error {
    fn from(source: mapping_datatypes::Error) -> Self {
        Error::DataType { source }
    }
}
