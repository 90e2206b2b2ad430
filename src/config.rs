use crate::codec::MetadataOptions;
use crate::error::Error;
use crate::types::PreEpochTimestamps;
use serde::Deserialize;
use std::path::PathBuf;

/// Parameters of the filesystem source component.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceParams {
    /// Root path to search for CTF traces.
    pub path: PathBuf,

    /// Seconds to add to the offset of all the clock classes the metadata
    /// decoder creates.
    #[serde(default)]
    pub offset_s: i64,

    /// Nanoseconds to add to the offset of all the clock classes the
    /// metadata decoder creates.
    #[serde(default)]
    pub offset_ns: i64,

    /// What to do with a packet `timestamp_begin` that lands before the
    /// clock's epoch.
    #[serde(default)]
    pub pre_epoch_timestamps: PreEpochTimestamps,
}

impl SourceParams {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        SourceParams {
            path: path.into(),
            offset_s: 0,
            offset_ns: 0,
            pre_epoch_timestamps: Default::default(),
        }
    }

    /// Loads parameters from the pipeline's loosely typed parameter map.
    /// A missing `path` or a wrong-typed entry fails initialization.
    pub fn from_value(params: &serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(params.clone()).map_err(Error::Params)
    }

    pub fn metadata_options(&self) -> MetadataOptions {
        MetadataOptions {
            clock_class_offset_s: self.offset_s,
            clock_class_offset_ns: self.offset_ns,
        }
    }
}

/// Parameters of the filesystem sink component.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SinkParams {
    /// Base directory under which output traces are created.
    pub path: PathBuf,

    /// Name base of output trace directories: each input trace lands in
    /// `<path>/<trace-name>_NNN`.
    #[serde(default = "default_trace_name")]
    pub trace_name: String,
}

impl SinkParams {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        SinkParams {
            path: path.into(),
            trace_name: default_trace_name(),
        }
    }

    pub fn from_value(params: &serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(params.clone()).map_err(Error::Params)
    }
}

fn default_trace_name() -> String {
    "trace".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn source_params_from_map() {
        let params = SourceParams::from_value(&json!({
            "path": "/data/traces",
            "offset-s": 2,
            "offset-ns": -1,
            "pre-epoch-timestamps": "ignore",
        }))
        .unwrap();
        assert_eq!(
            params,
            SourceParams {
                path: PathBuf::from("/data/traces"),
                offset_s: 2,
                offset_ns: -1,
                pre_epoch_timestamps: PreEpochTimestamps::Ignore,
            }
        );
        assert_eq!(
            params.metadata_options(),
            MetadataOptions {
                clock_class_offset_s: 2,
                clock_class_offset_ns: -1,
            }
        );
    }

    #[test]
    fn source_params_defaults() {
        let params = SourceParams::from_value(&json!({ "path": "t" })).unwrap();
        assert_eq!(params, SourceParams::new("t"));
    }

    #[test]
    fn wrong_typed_params_fail_init() {
        assert!(matches!(
            SourceParams::from_value(&json!({ "path": "t", "offset-s": "two" })),
            Err(Error::Params(_))
        ));
        assert!(matches!(
            SourceParams::from_value(&json!({ "offset-s": 2 })),
            Err(Error::Params(_))
        ));
        assert!(matches!(
            SinkParams::from_value(&json!({ "path": 1 })),
            Err(Error::Params(_))
        ));
    }

    #[test]
    fn sink_params_default_trace_name() {
        let params = SinkParams::from_value(&json!({ "path": "/out" })).unwrap();
        assert_eq!(params.trace_name, "trace");
        let params =
            SinkParams::from_value(&json!({ "path": "/out", "trace-name": "kernel" })).unwrap();
        assert_eq!(params.trace_name, "kernel");
    }
}
