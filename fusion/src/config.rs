//! Which fusions run, and how hard the rewrite driver may try.

use bon::bon;
use kiln_ir::RewriteConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FusionConfig {
    /// `1 / (1 + exp(-x))` to `Sigmoid`.
    pub sigmoid: bool,
    /// Unrolled LSTM cells to `Lstm`.
    pub lstm_cell: bool,
    /// Chains of `Lstm` cells to `Rnn`.
    pub rnn: bool,
    /// Stacked `Rnn` layers to one multi-layer `Rnn`.
    pub multi_layer_rnn: bool,
    pub rewrite: RewriteConfig,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { sigmoid: true, lstm_cell: true, rnn: true, multi_layer_rnn: true, rewrite: RewriteConfig::default() }
    }
}

#[bon]
impl FusionConfig {
    #[builder]
    pub fn builder(
        #[builder(default = true)] sigmoid: bool,
        #[builder(default = true)] lstm_cell: bool,
        #[builder(default = true)] rnn: bool,
        #[builder(default = true)] multi_layer_rnn: bool,
        #[builder(default)] rewrite: RewriteConfig,
    ) -> Self {
        Self { sigmoid, lstm_cell, rnn, multi_layer_rnn, rewrite }
    }

    /// Every fusion switched off.
    pub fn disabled() -> Self {
        Self { sigmoid: false, lstm_cell: false, rnn: false, multi_layer_rnn: false, rewrite: RewriteConfig::default() }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `KILN_NO_FUSION` - Disable every fusion if set
    /// * `KILN_DISABLE_SIGMOID` - Skip sigmoid fusion
    /// * `KILN_DISABLE_LSTM_CELL` - Skip LSTM cell fusion
    /// * `KILN_DISABLE_RNN` - Skip RNN fusion
    /// * `KILN_DISABLE_MULTI_LAYER_RNN` - Skip multi-layer RNN fusion
    ///
    /// Rewrite bounds are read by [`RewriteConfig::from_env`].
    pub fn from_env() -> Self {
        let off = std::env::var("KILN_NO_FUSION").is_ok();
        let enabled = |pass: &str| !off && std::env::var(format!("KILN_DISABLE_{pass}")).is_err();

        Self {
            sigmoid: enabled("SIGMOID"),
            lstm_cell: enabled("LSTM_CELL"),
            rnn: enabled("RNN"),
            multi_layer_rnn: enabled("MULTI_LAYER_RNN"),
            rewrite: RewriteConfig::from_env(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        !(self.sigmoid || self.lstm_cell || self.rnn || self.multi_layer_rnn)
    }
}
