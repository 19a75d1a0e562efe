//! Conversions between buffer rows and tensors

use anyhow::Result;
use tch::{Device, Kind, Tensor};

use crate::error::PPGError;

/// Stack equally sized rows into a `[rows, width]` float tensor on `device`
///
/// Ragged input is a precondition violation.
pub fn stack_rows(rows: &[Vec<f32>], device: Device) -> Result<Tensor> {
    let width = rows.first().map_or(0, Vec::len);
    if let Some(index) = rows.iter().position(|row| row.len() != width) {
        return Err(PPGError::precondition(format!(
            "row {index} has {} elements, expected {width}",
            rows[index].len()
        ))
        .into());
    }

    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Ok(Tensor::from_slice(&flat).reshape([rows.len() as i64, width as i64]).to_device(device))
}

/// Copy any tensor to a flat `Vec<f32>` on the host
pub fn to_vec_f32(tensor: &Tensor) -> Result<Vec<f32>> {
    let flat = tensor.detach().to_device(Device::Cpu).to_kind(Kind::Float).contiguous().view([-1]);
    Ok(Vec::try_from(flat)?)
}

/// Scalar tensor to `f64`
pub fn scalar(tensor: &Tensor) -> Result<f64> {
    Ok(f64::try_from(tensor.detach().to_device(Device::Cpu))?)
}
