//! Loss function(s)

use crate::values::Value;

/// Mean Squared Error Loss between two vectors of values
pub struct MSELoss;

impl MSELoss {
    pub fn call<T, U>(y_pred: &[T], y_true: &[U]) -> Value
    where
        T: AsRef<Value>,
        U: AsRef<Value>,
    {
        let loss = y_pred
            .iter()
            .zip(y_true.iter())
            .map(|(a, b)| (a.as_ref() - b.as_ref()).pow(&Value::new(2.0)))
            .sum::<Value>();
        loss / Value::new(y_pred.len() as f32)
    }
}

/// Negative log likelihood loss over log-probabilities and a class index
///
/// Expects the predictions to already be log-probabilities (the output of
/// [`crate::nn::LogSoftmax`]).
pub struct NLLLoss;

impl NLLLoss {
    pub fn call(log_probs: &[Value], target: usize) -> Value {
        debug_assert!(target < log_probs.len());
        -&log_probs[target]
    }
}
