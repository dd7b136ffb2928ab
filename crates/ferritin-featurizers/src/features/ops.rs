//! Array operations over feature values: concatenation, block-diagonal
//! stacking, cropping, padding.
use super::FeatureValue;
use crate::error::{FeatureError, Result};
use ndarray::{concatenate, s, Array2, ArrayD, ArrayView2, Axis, IxDyn, Slice};

/// Stack 2-D arrays along the diagonal, filling the off-diagonal blocks with `pad`.
pub fn block_diag<T: Clone>(arrays: &[ArrayView2<T>], pad: T) -> Array2<T> {
    let rows = arrays.iter().map(|a| a.nrows()).sum();
    let cols = arrays.iter().map(|a| a.ncols()).sum();
    let mut out = Array2::from_elem((rows, cols), pad);
    let (mut r, mut c) = (0, 0);
    for a in arrays {
        let (rr, cc) = a.dim();
        out.slice_mut(s![r..r + rr, c..c + cc]).assign(a);
        r += rr;
        c += cc;
    }
    out
}

fn concat_arrays<T: Clone>(arrays: &[&ArrayD<T>], axis: usize) -> Result<ArrayD<T>> {
    let views: Vec<_> = arrays.iter().map(|a| a.view()).collect();
    Ok(concatenate(Axis(axis), &views)?)
}

fn pad_array<T: Clone>(
    name: &str,
    array: &ArrayD<T>,
    axis: usize,
    target: usize,
    value: T,
) -> Result<ArrayD<T>> {
    let size = array.shape()[axis];
    if size > target {
        return Err(FeatureError::PadTooSmall {
            name: name.to_string(),
            axis,
            size,
            target,
        });
    }
    let mut shape = array.shape().to_vec();
    shape[axis] = target;
    let mut out = ArrayD::from_elem(IxDyn(&shape), value);
    out.slice_axis_mut(Axis(axis), Slice::from(0..size))
        .assign(array);
    Ok(out)
}

fn as_matrix<'a, T>(name: &str, array: &'a ArrayD<T>) -> Result<ArrayView2<'a, T>> {
    array
        .view()
        .into_dimensionality()
        .map_err(|_| FeatureError::SchemaRank {
            name: name.to_string(),
            rank: array.ndim(),
            expected: 2,
        })
}

impl FeatureValue {
    /// Concatenate same-typed features along `axis`. Text values only concatenate along axis 0.
    pub fn concatenate(name: &str, values: &[&FeatureValue], axis: usize) -> Result<FeatureValue> {
        match values.first() {
            Some(FeatureValue::F32(_)) => {
                let arrays = values
                    .iter()
                    .map(|v| v.as_f32().ok_or_else(|| type_error(name, "f32")))
                    .collect::<Result<Vec<_>>>()?;
                Ok(FeatureValue::F32(concat_arrays(&arrays, axis)?))
            }
            Some(FeatureValue::I64(_)) => {
                let arrays = values
                    .iter()
                    .map(|v| v.as_i64().ok_or_else(|| type_error(name, "i64")))
                    .collect::<Result<Vec<_>>>()?;
                Ok(FeatureValue::I64(concat_arrays(&arrays, axis)?))
            }
            Some(FeatureValue::Text(_)) if axis == 0 => {
                let mut out = Vec::new();
                for v in values {
                    out.extend_from_slice(v.as_text().ok_or_else(|| type_error(name, "text"))?);
                }
                Ok(FeatureValue::Text(out))
            }
            Some(FeatureValue::Text(_)) => Err(type_error(name, "numeric")),
            None => Err(FeatureError::MissingFeature(name.to_string())),
        }
    }

    /// Block-diagonal stacking of 2-D features, padding with `pad_value`.
    pub fn block_diag(name: &str, values: &[&FeatureValue], pad_value: f64) -> Result<FeatureValue> {
        match values.first() {
            Some(FeatureValue::F32(_)) => {
                let views = values
                    .iter()
                    .map(|v| {
                        let a = v.as_f32().ok_or_else(|| type_error(name, "f32"))?;
                        as_matrix(name, a)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(FeatureValue::F32(block_diag(&views, pad_value as f32).into_dyn()))
            }
            Some(FeatureValue::I64(_)) => {
                let views = values
                    .iter()
                    .map(|v| {
                        let a = v.as_i64().ok_or_else(|| type_error(name, "i64"))?;
                        as_matrix(name, a)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(FeatureValue::I64(block_diag(&views, pad_value as i64).into_dyn()))
            }
            Some(FeatureValue::Text(_)) => Err(type_error(name, "numeric")),
            None => Err(FeatureError::MissingFeature(name.to_string())),
        }
    }

    /// Keep the first `n` entries of the leading axis.
    pub fn crop_leading(&self, n: usize) -> FeatureValue {
        let n = n.min(self.len());
        match self {
            FeatureValue::F32(a) => {
                FeatureValue::F32(a.slice_axis(Axis(0), Slice::from(0..n)).to_owned())
            }
            FeatureValue::I64(a) => {
                FeatureValue::I64(a.slice_axis(Axis(0), Slice::from(0..n)).to_owned())
            }
            FeatureValue::Text(t) => FeatureValue::Text(t[..n].to_vec()),
        }
    }

    /// Grow `axis` to `target` entries, filling with `pad_value`.
    pub fn pad_axis(&self, name: &str, axis: usize, target: usize, pad_value: f64) -> Result<FeatureValue> {
        if axis >= self.ndim() {
            return Err(FeatureError::SchemaRank {
                name: name.to_string(),
                rank: self.ndim(),
                expected: axis + 1,
            });
        }
        match self {
            FeatureValue::F32(a) => Ok(FeatureValue::F32(pad_array(
                name,
                a,
                axis,
                target,
                pad_value as f32,
            )?)),
            FeatureValue::I64(a) => Ok(FeatureValue::I64(pad_array(
                name,
                a,
                axis,
                target,
                pad_value as i64,
            )?)),
            FeatureValue::Text(t) => {
                if t.len() > target {
                    return Err(FeatureError::PadTooSmall {
                        name: name.to_string(),
                        axis,
                        size: t.len(),
                        target,
                    });
                }
                let mut out = t.clone();
                out.resize(target, None);
                Ok(FeatureValue::Text(out))
            }
        }
    }

    /// Sum of scalar-like features (first element of each), as an `i64` scalar.
    pub fn sum_scalars(name: &str, values: &[&FeatureValue]) -> Result<FeatureValue> {
        let mut total = 0;
        for v in values {
            total += v.first_i64().ok_or_else(|| type_error(name, "numeric"))?;
        }
        Ok(FeatureValue::scalar_i64(total))
    }
}

/// Index of the largest entry along the last axis; the first one wins on ties.
pub(crate) fn argmax_last_axis(array: &ArrayD<i64>) -> ArrayD<i64> {
    let last = array.ndim().saturating_sub(1);
    array.map_axis(Axis(last), |lane| {
        let mut best = 0;
        for (i, v) in lane.iter().enumerate() {
            if *v > lane[best] {
                best = i;
            }
        }
        best as i64
    })
}

fn type_error(name: &str, expected: &'static str) -> FeatureError {
    FeatureError::FeatureType {
        name: name.to_string(),
        expected,
    }
}
