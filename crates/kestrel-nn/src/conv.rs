// Convolution & Pooling — the two windowed layers
//
// Both layers slide a ksize×ksize window over the rows/cols plane of their
// input. Window counts come from the geometry descriptors in kestrel-core:
//
//   h_out = floor((rows + 2*pad - ksize) / stride) + 1
//   w_out = floor((cols + 2*pad - ksize) / stride) + 1
//
// PARAMETER SHAPES (Convolution):
//
//   weight: (ksize, ksize, chls / secc, flts)   one filter per nums slice
//   bias:   (1, 1, flts, 1)                     one value per output channel
//
// Filters are split into `secc` groups; each group only sees chls / secc
// input channels.
//
// OUTPUT SHAPES:
//
//   Convolution  (h_col, w_col, flts, nums)
//   Pooling      (h_pool, w_pool, chls, nums)

use kestrel_core::backend::Backend;
use kestrel_core::error::{Error, Result};
use kestrel_core::geometry::{PatchGeometry, PoolGeometry};
use kestrel_core::random::{Init, Initializer};
use kestrel_core::tensor::Tensor;

use crate::layer::{delegate_base, Layer, LayerBase};
use crate::layer_spec::LayerSpec;

/// Grouped 2D convolution.
pub struct Convolution<B: Backend> {
    base: LayerBase<B>,
    weight: Tensor<B>,
    bias: Tensor<B>,
    geometry: PatchGeometry,
}

impl<B: Backend> Convolution<B> {
    /// Bind a convolution spec to its node buffers and allocate parameters.
    ///
    /// Fails if the destination buffer does not have the planned output shape.
    pub fn new(
        spec: &LayerSpec,
        device: &B::Device,
        src: &Tensor<B>,
        dst: &Tensor<B>,
    ) -> Result<Self> {
        let base = LayerBase::new(spec, device, src, dst)?;
        base.check_planned_output()?;
        let geometry = spec.patch().pack_shape(src.shape())?;
        let (w_shape, b_shape) = spec
            .param_shapes(src.shape())?
            .ok_or_else(|| Error::msg("convolution without parameters"))?;
        let weight = Tensor::zeros(w_shape, &base.device)?;
        let bias = Tensor::zeros(b_shape, &base.device)?;
        Ok(Convolution {
            base,
            weight,
            bias,
            geometry,
        })
    }

    pub fn weight(&self) -> &Tensor<B> {
        &self.weight
    }

    pub fn bias(&self) -> &Tensor<B> {
        &self.bias
    }

    pub fn weight_mut(&mut self) -> &mut Tensor<B> {
        &mut self.weight
    }

    pub fn bias_mut(&mut self) -> &mut Tensor<B> {
        &mut self.bias
    }

    /// Unrolled column-buffer geometry for this layer's input.
    pub fn geometry(&self) -> &PatchGeometry {
        &self.geometry
    }

    pub fn groups(&self) -> usize {
        self.base.spec.secc
    }
}

impl<B: Backend> Layer<B> for Convolution<B> {
    delegate_base!();

    fn params(&self) -> Vec<&Tensor<B>> {
        vec![&self.weight, &self.bias]
    }

    /// Weights ~ N(0, sigma²), biases zero.
    fn init_params(&mut self, rng: &mut Initializer) -> Result<()> {
        rng.fill(
            &mut self.weight,
            Init::Gaussian {
                mean: 0.0,
                std: f64::from(self.base.spec.sigma),
            },
        )?;
        self.bias.mem_set(0)
    }
}

/// Spatial pooling; `pool` selects the reduction.
pub struct Pooling<B: Backend> {
    base: LayerBase<B>,
    geometry: PoolGeometry,
}

impl<B: Backend> Pooling<B> {
    pub fn new(
        spec: &LayerSpec,
        device: &B::Device,
        src: &Tensor<B>,
        dst: &Tensor<B>,
    ) -> Result<Self> {
        let base = LayerBase::new(spec, device, src, dst)?;
        let geometry = spec.pool_window().pool_shape(src.shape())?;
        base.expect_dst(geometry.shape)?;
        Ok(Pooling { base, geometry })
    }

    pub fn geometry(&self) -> &PoolGeometry {
        &self.geometry
    }

    /// Pooling reduction selector.
    pub fn pool_type(&self) -> i32 {
        self.base.spec.pool
    }
}

impl<B: Backend> Layer<B> for Pooling<B> {
    delegate_base!();
}
