//! Piecewise-linear transfer function.
//!
//! Parameters:
//! - `colors`: data array of vec3f control colours (required, non-empty)
//! - `opacities`: data array of float control opacities (default: opaque)
//! - `valueRange`: vec2f field range mapped onto the control points (default (0, 1))
//!
//! Control points are spaced evenly over the value range. Values outside the
//! range clamp to the first or last control point.

use std::sync::Arc;

use crate::core::error::{ConfigError, Error};
use crate::core::types::{Result, Vec2, Vec3};
use crate::object::managed::ManagedObject;
use crate::object::param::{ParamKind, ParamStore};
use crate::transfer::{TransferFunction, TransferMap, TRANSFER_FUNCTION_TYPE};

/// Registered type name.
pub const TYPE_NAME: &str = "piecewise_linear";

/// Types that can be linearly interpolated.
trait Lerp: Copy {
    fn lerp(self, other: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    #[inline]
    fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Lerp for Vec3 {
    #[inline]
    fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

/// Sample evenly spaced control points at normalized position `t` in [0, 1].
fn sample_evenly<T: Lerp>(points: &[T], t: f32) -> T {
    if points.len() == 1 {
        return points[0];
    }
    let scaled = t * (points.len() - 1) as f32;
    let lower = (scaled.floor() as usize).min(points.len() - 2);
    let frac = scaled - lower as f32;
    points[lower].lerp(points[lower + 1], frac)
}

/// Compiled piecewise-linear mapping.
#[derive(Clone, Debug)]
pub struct LinearTransferMap {
    colors: Vec<Vec3>,
    opacities: Vec<f32>,
    value_range: Vec2,
}

impl LinearTransferMap {
    /// Build directly from control points. Both lists must be non-empty and
    /// `value_range.x < value_range.y`.
    pub fn new(colors: Vec<Vec3>, opacities: Vec<f32>, value_range: Vec2) -> Self {
        debug_assert!(!colors.is_empty() && !opacities.is_empty());
        debug_assert!(value_range.x < value_range.y);
        Self {
            colors,
            opacities,
            value_range,
        }
    }

    /// Map a field value into [0, 1]. NaN maps to 0.
    fn normalize(&self, value: f32) -> f32 {
        let t = (value - self.value_range.x) / (self.value_range.y - self.value_range.x);
        if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) }
    }

    pub fn colors(&self) -> &[Vec3] {
        &self.colors
    }

    pub fn opacities(&self) -> &[f32] {
        &self.opacities
    }
}

impl TransferMap for LinearTransferMap {
    fn color(&self, value: f32) -> Vec3 {
        sample_evenly(&self.colors, self.normalize(value))
    }

    fn opacity(&self, value: f32) -> f32 {
        sample_evenly(&self.opacities, self.normalize(value))
    }

    fn value_range(&self) -> Vec2 {
        self.value_range
    }
}

/// Transfer function entity registered as `"piecewise_linear"`.
pub struct PiecewiseLinearTransferFunction {
    object: ManagedObject<dyn TransferMap>,
}

impl PiecewiseLinearTransferFunction {
    pub fn new() -> Self {
        Self {
            object: ManagedObject::new(TRANSFER_FUNCTION_TYPE),
        }
    }

    fn compile(params: &ParamStore) -> Result<LinearTransferMap> {
        let fail = |kind: ConfigError| Error::config(TRANSFER_FUNCTION_TYPE, kind);

        for (name, kind) in [
            ("colors", ParamKind::Data),
            ("opacities", ParamKind::Data),
            ("valueRange", ParamKind::Vec2f),
        ] {
            params.check_kind(name, &[kind]).map_err(fail)?;
        }

        let colors = params
            .get_data("colors")
            .ok_or(fail(ConfigError::MissingParameter("colors")))?
            .to_vec3s();
        if colors.is_empty() {
            return Err(fail(ConfigError::InvalidParameter {
                name: "colors",
                reason: "expected a non-empty array of vec3f".to_string(),
            }));
        }

        let opacities = match params.get_data("opacities") {
            Some(data) => {
                let opacities = data.to_f32s();
                if opacities.is_empty() {
                    return Err(fail(ConfigError::InvalidParameter {
                        name: "opacities",
                        reason: "expected a non-empty array of float".to_string(),
                    }));
                }
                opacities
            }
            None => vec![1.0],
        };

        let value_range = params.get_vec2f("valueRange", Vec2::new(0.0, 1.0));
        if !value_range.is_finite() || value_range.x >= value_range.y {
            return Err(fail(ConfigError::InvalidParameter {
                name: "valueRange",
                reason: format!("expected finite lo < hi, got {}", value_range),
            }));
        }

        Ok(LinearTransferMap::new(colors, opacities, value_range))
    }
}

impl Default for PiecewiseLinearTransferFunction {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferFunction for PiecewiseLinearTransferFunction {
    fn object(&self) -> &ManagedObject<dyn TransferMap> {
        &self.object
    }

    fn object_mut(&mut self) -> &mut ManagedObject<dyn TransferMap> {
        &mut self.object
    }

    fn commit(&mut self) -> Result<()> {
        let id = self.object.id();
        self.object.commit_with(|params| {
            let map = Self::compile(params)?;
            log::debug!(
                "piecewise_linear {}: {} colors, {} opacities, range {}",
                id,
                map.colors.len(),
                map.opacities.len(),
                map.value_range
            );
            Ok(Arc::new(map) as Arc<dyn TransferMap>)
        })?;
        Ok(())
    }
}
