use std::time::Instant;

use crate::error::InferenceError;

/// The three stages every model runner goes through.
pub trait InferenceProcess {
    type Input: ?Sized;
    type Prepared;
    type Raw;
    type Output;

    /// Pre-process the input data.
    fn preprocess(&self, x: &Self::Input) -> Result<Self::Prepared, InferenceError>;

    /// Executes the model on the preprocessed data.
    fn inference(&self, x: &Self::Prepared) -> Result<Self::Raw, InferenceError>;

    /// Post-process the model's output.
    fn postprocess(&self, ys: Self::Raw, x: &Self::Prepared, thresh: f32) -> Result<Self::Output, InferenceError>;

    /// Executes the full pipeline.
    fn run(&self, x: &Self::Input, thresh: f32) -> Result<Self::Output, InferenceError> {
        let t_pre = Instant::now();
        let prepared = self.preprocess(x)?;
        let t_pre = t_pre.elapsed();

        let t_exe = Instant::now();
        let ys = self.inference(&prepared)?;
        let t_exe = t_exe.elapsed();

        let t_post = Instant::now();
        let ys = self.postprocess(ys, &prepared, thresh)?;
        let t_post = t_post.elapsed();

        log::debug!("> Preprocess: {t_pre:?} | Inference: {t_exe:?} | Postprocess: {t_post:?}");
        Ok(ys)
    }
}
