use ndarray::Array2;
use std::collections::HashMap;

/// Optimizer trait for parameter updates during training
pub trait Optimizer {
    fn update(&mut self, param_id: &str, param: &mut Array2<f64>, gradient: &Array2<f64>);
}

/// Per-parameter Adam state.
struct Moments {
    m: Array2<f64>,
    v: Array2<f64>,
    t: i32,
}

/// Adam optimizer with adaptive learning rates
///
/// Implements: m_t = β₁m_{t-1} + (1-β₁)g_t
///             v_t = β₂v_{t-1} + (1-β₂)g_t²
///             θ_t = θ_{t-1} - η * m̂_t / (√v̂_t + ε)
/// where m̂_t and v̂_t are bias-corrected estimates. The step count is kept
/// per parameter so bias correction does not depend on how many tensors exist.
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    state: HashMap<String, Moments>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Adam::with_params(learning_rate, 0.9, 0.999, 1e-7)
    }

    pub fn with_params(learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            state: HashMap::new(),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

impl Optimizer for Adam {
    fn update(&mut self, param_id: &str, param: &mut Array2<f64>, gradient: &Array2<f64>) {
        let moments = self.state.entry(param_id.to_string()).or_insert_with(|| Moments {
            m: Array2::zeros(param.raw_dim()),
            v: Array2::zeros(param.raw_dim()),
            t: 0,
        });
        moments.t += 1;

        let (beta1, beta2) = (self.beta1, self.beta2);
        moments.m.zip_mut_with(gradient, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
        moments.v.zip_mut_with(gradient, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);

        let m_correction = 1.0 - beta1.powi(moments.t);
        let v_correction = 1.0 - beta2.powi(moments.t);
        let (lr, eps) = (self.learning_rate, self.epsilon);

        ndarray::Zip::from(param)
            .and(&moments.m)
            .and(&moments.v)
            .for_each(|p, &m, &v| {
                let m_hat = m / m_correction;
                let v_hat = v / v_correction;
                *p -= lr * m_hat / (v_hat.sqrt() + eps);
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_adam_first_step_is_learning_rate_sized() {
        let mut optimizer = Adam::new(0.001);
        let mut param = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let gradient = arr2(&[[0.1, -0.2], [0.3, 0.4]]);

        let original = param.clone();
        optimizer.update("w", &mut param, &gradient);

        // bias-corrected first step moves each weight by ~lr against the gradient sign
        let delta = &original - &param;
        for (d, g) in delta.iter().zip(gradient.iter()) {
            assert!((d.abs() - 0.001).abs() < 1e-6);
            assert_eq!(d.signum(), g.signum());
        }
    }

    #[test]
    fn test_adam_step_counts_are_per_parameter() {
        let mut optimizer = Adam::new(0.01);
        let mut a = arr2(&[[1.0]]);
        let mut b = arr2(&[[1.0]]);
        let g = arr2(&[[0.5]]);

        optimizer.update("a", &mut a, &g);
        optimizer.update("b", &mut b, &g);
        assert_eq!(a, b);

        // a constant gradient keeps the bias-corrected step at ~lr
        optimizer.update("a", &mut a, &g);
        assert!((a[[0, 0]] - 0.98).abs() < 1e-6);
        assert!((b[[0, 0]] - 0.99).abs() < 1e-6);
    }
}
