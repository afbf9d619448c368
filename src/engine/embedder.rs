//! Descriptor embedder
//!
//! Embeds an aligned face crop into a fixed-dimension descriptor
//! vector. Descriptors are compared by Euclidean distance downstream;
//! the raw model output is used as-is.

use anyhow::{Context, Result};
use image::DynamicImage;
use openvino::{ElementType, Shape, Tensor};

use super::model::SafeCompiledModel;
use super::preprocess::{image_to_nchw, EMBEDDER_INPUT_SIZE};
use crate::verify::types::FaceDescriptor;

pub struct DescriptorEmbedder {
    model: SafeCompiledModel,
    descriptor_dim: usize,
}

impl DescriptorEmbedder {
    pub fn new(model: SafeCompiledModel, descriptor_dim: usize) -> Self {
        Self {
            model,
            descriptor_dim,
        }
    }

    pub fn descriptor_dim(&self) -> usize {
        self.descriptor_dim
    }

    /// Embed a face crop into a descriptor.
    pub fn embed(&self, face: &DynamicImage) -> Result<FaceDescriptor> {
        let (target_w, target_h) = EMBEDDER_INPUT_SIZE;
        let resized = face.resize_exact(target_w, target_h, image::imageops::FilterType::Lanczos3);

        let input_tensor = image_to_nchw(&resized);

        let mut request = self.model.create_infer_request()?;

        let input_shape = Shape::new(&[1, 3, target_h as i64, target_w as i64])?;
        let mut input = Tensor::new(ElementType::F32, &input_shape)?;

        let input_data = input_tensor
            .as_slice()
            .context("embedder input tensor not contiguous")?;
        unsafe {
            let tensor_data = input.get_raw_data_mut()?.as_mut_ptr() as *mut f32;
            std::ptr::copy_nonoverlapping(input_data.as_ptr(), tensor_data, input_data.len());
        }

        request.set_input_tensor(&input)?;
        request.infer()?;

        let output = request.get_output_tensor()?;
        let output_shape = output.get_shape()?;
        let output_len: i64 = output_shape.get_dimensions().iter().product();

        let values: Vec<f32> = unsafe {
            let ptr = output.get_raw_data()?.as_ptr() as *const f32;
            std::slice::from_raw_parts(ptr, output_len as usize).to_vec()
        };

        if values.len() != self.descriptor_dim {
            anyhow::bail!(
                "embedder produced {} values, expected descriptor dimension {}",
                values.len(),
                self.descriptor_dim
            );
        }

        Ok(FaceDescriptor::new(values))
    }
}
