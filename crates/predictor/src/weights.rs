//! Neural predictor weights and their safetensors artifact.

use crate::predictor::PredictorShape;
use anyhow::{Context, Result};
use ndarray::Array2;
use safetensors::tensor::{Dtype, TensorView};
use safetensors::SafeTensors;
use std::fs;
use std::path::Path;

const EMBEDDING: &str = "embedding";
const HEAD_WEIGHT: &str = "head.weight";
const HEAD_BIAS: &str = "head.bias";

#[derive(Debug, Clone)]
pub struct NeuralWeights {
    pub embedding: Array2<f32>,   // (vocab_capacity, embedding_dim)
    pub head_weight: Array2<f32>, // (embedding_dim, vocab_capacity)
    pub head_bias: Array2<f32>,   // (1, vocab_capacity)
}

impl NeuralWeights {
    /// Small uniform initialisation drawn from `rng`.
    pub fn random(shape: &PredictorShape, rng: &mut fastrand::Rng) -> Self {
        let (vocab, dim) = (shape.vocab_capacity, shape.embedding_dim);
        let scale = (1.0 / dim.max(1) as f32).sqrt();
        let mut random_array = |rows: usize, cols: usize| {
            Array2::from_shape_fn((rows, cols), |_| (rng.f32() * 2.0 - 1.0) * scale)
        };

        Self {
            embedding: random_array(vocab, dim),
            head_weight: random_array(dim, vocab),
            head_bias: Array2::zeros((1, vocab)),
        }
    }

    pub fn load_safetensors(path: &Path, shape: &PredictorShape) -> Result<Self> {
        let data = fs::read(path)
            .with_context(|| format!("failed to read predictor artifact {}", path.display()))?;
        let tensors = SafeTensors::deserialize(&data).context("failed to parse safetensors")?;

        let (vocab, dim) = (shape.vocab_capacity, shape.embedding_dim);
        Ok(Self {
            embedding: load_tensor_2d(&tensors, EMBEDDING, (vocab, dim))?,
            head_weight: load_tensor_2d(&tensors, HEAD_WEIGHT, (dim, vocab))?,
            head_bias: load_tensor_2d(&tensors, HEAD_BIAS, (1, vocab))?,
        })
    }

    pub fn save_safetensors(&self, path: &Path) -> Result<()> {
        let named = [
            (EMBEDDING, &self.embedding),
            (HEAD_WEIGHT, &self.head_weight),
            (HEAD_BIAS, &self.head_bias),
        ];

        let mut views = Vec::with_capacity(named.len());
        for (name, array) in named {
            let floats = array
                .as_slice()
                .with_context(|| format!("tensor '{}' is not contiguous", name))?;
            let view = TensorView::new(
                Dtype::F32,
                array.shape().to_vec(),
                bytemuck::cast_slice(floats),
            )
            .with_context(|| format!("failed to describe tensor '{}'", name))?;
            views.push((name, view));
        }

        let blob = safetensors::serialize(views, &None).context("failed to encode safetensors")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, blob)
            .with_context(|| format!("failed to write predictor artifact {}", path.display()))?;
        Ok(())
    }
}

fn load_tensor_2d(
    tensors: &SafeTensors,
    name: &str,
    expected: (usize, usize),
) -> Result<Array2<f32>> {
    let view = tensors
        .tensor(name)
        .with_context(|| format!("tensor '{}' not found", name))?;

    anyhow::ensure!(view.dtype() == Dtype::F32, "expected f32 tensor for {}", name);
    let shape = view.shape();
    anyhow::ensure!(
        shape == [expected.0, expected.1].as_slice(),
        "tensor {} has shape {:?}, expected {:?}",
        name,
        shape,
        expected
    );

    let floats: Vec<f32> = view
        .data()
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    Array2::from_shape_vec(expected, floats).context("failed to reshape tensor")
}
