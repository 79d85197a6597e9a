//! Tensor-dump ingestion.
//!
//! A dump is a JSON file holding one inference frame's output layers as flat
//! float arrays, the way an inference harness would export them.

use std::{fs, path::Path};

use anyhow::{Context, Result, ensure};
use centerface_core::{LayerDims, OutputLayer};
use serde::Deserialize;

/// One serialized output layer.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerDump {
    pub name: String,
    /// Dims as `[channels, height, width]`.
    pub dims: [usize; 3],
    pub data: Vec<f32>,
}

/// On-disk dump of one inference frame's output tensors.
#[derive(Debug, Clone, Deserialize)]
pub struct TensorDump {
    /// Network input width the tensors were produced at (0 = unspecified).
    #[serde(default)]
    pub width: u32,
    /// Network input height the tensors were produced at (0 = unspecified).
    #[serde(default)]
    pub height: u32,
    pub layers: Vec<LayerDump>,
}

impl TensorDump {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read tensor dump {}", path.display()))?;
        let dump: TensorDump = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse tensor dump JSON at {}", path.display()))?;

        for layer in &dump.layers {
            let [channels, height, width] = layer.dims;
            ensure!(
                layer.data.len() == channels * height * width,
                "layer '{}' holds {} values but declares dims {}x{}x{}",
                layer.name,
                layer.data.len(),
                channels,
                height,
                width
            );
        }
        Ok(dump)
    }

    /// Borrow the dumped layers as parser-ready descriptors.
    pub fn output_layers(&self) -> Vec<OutputLayer<'_>> {
        self.layers
            .iter()
            .map(|layer| {
                let [channels, height, width] = layer.dims;
                OutputLayer::from_f32(
                    layer.name.clone(),
                    LayerDims::new(channels, height, width),
                    &layer.data,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_a_minimal_dump() {
        let mut file = NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"{{
                "width": 16,
                "height": 16,
                "layers": [
                    {{ "name": "537", "dims": [1, 2, 2], "data": [0.0, 0.9, 0.0, 0.0] }}
                ]
            }}"#
        )
        .expect("write dump");

        let dump = TensorDump::load(file.path()).expect("load");
        assert_eq!(dump.width, 16);
        assert_eq!(dump.height, 16);

        let layers = dump.output_layers();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].name, "537");
        assert_eq!(layers[0].dims, LayerDims::new(1, 2, 2));
    }

    #[test]
    fn rejects_inconsistent_layer_dims() {
        let mut file = NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"{{ "layers": [ {{ "name": "537", "dims": [1, 2, 2], "data": [0.0] }} ] }}"#
        )
        .expect("write dump");

        let err = TensorDump::load(file.path()).expect_err("load must fail");
        assert!(err.to_string().contains("537"));
    }
}
