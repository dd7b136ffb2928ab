//! Feature bundles
//!
//! A [`FeatureDict`] maps feature names to arrays, the format the network
//! consumes. Numeric features are n-d arrays (`f32` or `i64`); string-valued
//! features (sequence, domain names, release dates) are text lists where a
//! missing value is `None`.
pub(crate) mod ops;
mod sequence;

pub use self::ops::block_diag;
pub use self::sequence::{build_monomer_feature, build_multimer_feature, make_msa_features, make_sequence_features};

use crate::error::{FeatureError, Result};
use candle_core::{Device, Tensor};
use ndarray::{ArrayD, IxDyn};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    F32(ArrayD<f32>),
    I64(ArrayD<i64>),
    Text(Vec<Option<String>>),
}

impl FeatureValue {
    pub fn shape(&self) -> Vec<usize> {
        match self {
            FeatureValue::F32(a) => a.shape().to_vec(),
            FeatureValue::I64(a) => a.shape().to_vec(),
            FeatureValue::Text(t) => vec![t.len()],
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Size of the leading axis (rows for MSA features, residues for sequence ones).
    pub fn len(&self) -> usize {
        self.shape().first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn scalar_i64(value: i64) -> Self {
        FeatureValue::I64(ArrayD::from_elem(IxDyn(&[]), value))
    }

    pub fn scalar_f32(value: f32) -> Self {
        FeatureValue::F32(ArrayD::from_elem(IxDyn(&[]), value))
    }

    pub fn text<S: Into<String>>(value: S) -> Self {
        FeatureValue::Text(vec![Some(value.into())])
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            FeatureValue::F32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&ArrayD<i64>> {
        match self {
            FeatureValue::I64(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&[Option<String>]> {
        match self {
            FeatureValue::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Numeric values as `f32`, whatever the storage type.
    pub fn to_f32(&self) -> Option<ArrayD<f32>> {
        match self {
            FeatureValue::F32(a) => Some(a.clone()),
            FeatureValue::I64(a) => Some(a.mapv(|v| v as f32)),
            FeatureValue::Text(_) => None,
        }
    }

    /// First element of a numeric feature; scalars and `[n]`-repeated values alike.
    pub fn first_i64(&self) -> Option<i64> {
        match self {
            FeatureValue::F32(a) => a.iter().next().map(|v| *v as i64),
            FeatureValue::I64(a) => a.iter().next().copied(),
            FeatureValue::Text(_) => None,
        }
    }

    fn to_tensor(&self) -> Result<Option<Tensor>> {
        let tensor = match self {
            FeatureValue::F32(a) => Tensor::from_vec(
                a.iter().copied().collect::<Vec<_>>(),
                a.shape().to_vec(),
                &Device::Cpu,
            )?,
            FeatureValue::I64(a) => Tensor::from_vec(
                a.iter().copied().collect::<Vec<_>>(),
                a.shape().to_vec(),
                &Device::Cpu,
            )?,
            FeatureValue::Text(_) => return Ok(None),
        };
        Ok(Some(tensor))
    }
}

/// Named features of one prediction unit. Iteration order is by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureDict(BTreeMap<String, FeatureValue>);

impl FeatureDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: Into<String>>(&mut self, name: K, value: FeatureValue) -> Option<FeatureValue> {
        self.0.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<FeatureValue> {
        self.0.remove(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FeatureValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add every feature of `other`, replacing features with the same name.
    pub fn extend(&mut self, other: FeatureDict) {
        self.0.extend(other.0);
    }

    pub fn retain<F: FnMut(&str, &FeatureValue) -> bool>(&mut self, mut f: F) {
        self.0.retain(|k, v| f(k, v));
    }

    /// Look up a feature that must be present.
    pub fn require(&self, name: &str) -> Result<&FeatureValue> {
        self.get(name)
            .ok_or_else(|| FeatureError::MissingFeature(name.to_string()))
    }

    pub fn require_i64(&self, name: &str) -> Result<&ArrayD<i64>> {
        self.require(name)?
            .as_i64()
            .ok_or_else(|| FeatureError::FeatureType {
                name: name.to_string(),
                expected: "i64",
            })
    }

    pub fn require_f32(&self, name: &str) -> Result<&ArrayD<f32>> {
        self.require(name)?
            .as_f32()
            .ok_or_else(|| FeatureError::FeatureType {
                name: name.to_string(),
                expected: "f32",
            })
    }

    pub fn require_text(&self, name: &str) -> Result<&[Option<String>]> {
        self.require(name)?
            .as_text()
            .ok_or_else(|| FeatureError::FeatureType {
                name: name.to_string(),
                expected: "text",
            })
    }

    /// Write every numeric feature to a safetensors file; text features are skipped.
    pub fn save_to_safetensor<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let mut tensors: HashMap<String, Tensor> = HashMap::new();
        for (name, value) in self.iter() {
            if let Some(tensor) = value.to_tensor()? {
                tensors.insert(name.clone(), tensor);
            }
        }
        candle_core::safetensors::save(&tensors, path)?;
        Ok(())
    }
}

impl FromIterator<(String, FeatureValue)> for FeatureDict {
    fn from_iter<I: IntoIterator<Item = (String, FeatureValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for FeatureDict {
    type Item = (String, FeatureValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FeatureValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_feature_value_shapes() {
        let v = FeatureValue::I64(array![[1i64, 2], [3, 4], [5, 6]].into_dyn());
        assert_eq!(v.shape(), vec![3, 2]);
        assert_eq!(v.len(), 3);
        assert_eq!(FeatureValue::scalar_i64(7).shape(), Vec::<usize>::new());
        assert_eq!(FeatureValue::scalar_i64(7).first_i64(), Some(7));
        assert_eq!(FeatureValue::text("none").shape(), vec![1]);
    }

    #[test]
    fn test_require_reports_type_mismatch() {
        let mut dict = FeatureDict::new();
        dict.insert("msa", FeatureValue::scalar_f32(1.0));
        assert!(dict.require_f32("msa").is_ok());
        assert!(matches!(
            dict.require_i64("msa"),
            Err(FeatureError::FeatureType { .. })
        ));
        assert!(matches!(
            dict.require("aatype"),
            Err(FeatureError::MissingFeature(_))
        ));
    }

    #[test]
    fn test_save_to_safetensor_skips_text() {
        let mut dict = FeatureDict::new();
        dict.insert("aatype", FeatureValue::I64(array![0i64, 1, 2].into_dyn()));
        dict.insert("seq_length", FeatureValue::scalar_i64(3));
        dict.insert("sequence", FeatureValue::text("ARN"));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.safetensors");
        dict.save_to_safetensor(&path).unwrap();

        let tensors = candle_core::safetensors::load(&path, &Device::Cpu).unwrap();
        assert_eq!(tensors.len(), 2);
        assert_eq!(tensors["aatype"].dims(), &[3]);
    }
}
