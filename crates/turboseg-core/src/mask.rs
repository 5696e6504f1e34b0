//! Segmentation logits

use burn::prelude::*;

/// Single-channel, real-valued segmentation logits [height, width]
#[derive(Debug, Clone)]
pub struct LogitMask<B: Backend>(Tensor<B, 2>);

impl<B: Backend> LogitMask<B> {
    pub fn new(logits: Tensor<B, 2>) -> Self {
        Self(logits)
    }

    /// Take the first batch item and first channel of a [batch, channels, H, W] head output
    pub fn from_head_output(output: Tensor<B, 4>) -> Self {
        let [_, _, h, w] = output.dims();
        Self(output.slice([0..1, 0..1, 0..h, 0..w]).reshape([h, w]))
    }

    pub fn height(&self) -> usize {
        self.0.dims()[0]
    }

    pub fn width(&self) -> usize {
        self.0.dims()[1]
    }

    pub fn logits(&self) -> &Tensor<B, 2> {
        &self.0
    }

    /// Row-major logits copied to the host as f32
    pub fn to_host(&self) -> Vec<f32> {
        self.0.clone().into_data().iter::<f32>().collect()
    }

    pub fn into_tensor(self) -> Tensor<B, 2> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_from_head_output_drops_batch_and_channel() {
        let device = Default::default();
        let output = Tensor::<TestBackend, 4>::ones([2, 3, 5, 7], &device);
        let mask = LogitMask::from_head_output(output);

        assert_eq!(mask.height(), 5);
        assert_eq!(mask.width(), 7);
    }

    #[test]
    fn test_to_host_is_row_major() {
        let device = Default::default();
        let values = vec![0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0];
        let mask = LogitMask::new(Tensor::<TestBackend, 2>::from_data(
            TensorData::new(values.clone(), [2, 3]),
            &device,
        ));

        assert_eq!(mask.to_host(), values);
    }
}
