use std::{fmt, str::FromStr};

use serde::{Serialize, Deserialize};

use crate::{normalizers, Error};

/// One row of the activation table: the smooth function used while training,
/// the one used for inference and the derivative expressed through the net
/// value and the already computed training output.
pub struct ActivationTable {
    pub name: &'static str,
    pub act: fn(f64) -> f64,
    pub infer: fn(f64) -> f64,
    pub deriv: fn(f64, f64) -> f64,
}

const HARDLIM: ActivationTable = ActivationTable {
    name: "hardlim",
    act: normalizers::sigmoid,
    infer: normalizers::step,
    deriv: normalizers::sigmoid_derivative,
};

const HARDLIMS: ActivationTable = ActivationTable {
    name: "hardlims",
    act: normalizers::tanh,
    infer: normalizers::sign_step,
    deriv: normalizers::tanh_derivative,
};

const LOGSIG: ActivationTable = ActivationTable {
    name: "logsig",
    act: normalizers::sigmoid,
    infer: normalizers::sigmoid,
    deriv: normalizers::sigmoid_derivative,
};

const PURELIN: ActivationTable = ActivationTable {
    name: "purelin",
    act: normalizers::exact,
    infer: normalizers::exact,
    deriv: normalizers::exact_derivative,
};

const SATLIN: ActivationTable = ActivationTable {
    name: "satlin",
    act: normalizers::sigmoid,
    infer: normalizers::saturate,
    deriv: normalizers::sigmoid_derivative,
};

const SATLINS: ActivationTable = ActivationTable {
    name: "satlins",
    act: normalizers::tanh,
    infer: normalizers::saturate_symmetric,
    deriv: normalizers::tanh_derivative,
};

const TANSIG: ActivationTable = ActivationTable {
    name: "tansig",
    act: normalizers::tanh,
    infer: normalizers::tanh,
    deriv: normalizers::tanh_derivative,
};

// Marker for one-hot output layers. Their neurons are always built with
// tansig, so the functions here only matter if a caller fires a neuron
// with the marker directly.
const ONEHOT: ActivationTable = ActivationTable {
    name: "onehot",
    act: normalizers::tanh,
    infer: normalizers::tanh,
    deriv: normalizers::tanh_derivative,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Hardlim,
    Hardlims,
    Logsig,
    Purelin,
    Satlin,
    Satlins,
    Tansig,
    Onehot,
}

impl Activation {
    pub const ALL: [Activation; 8] = [
        Activation::Hardlim,
        Activation::Hardlims,
        Activation::Logsig,
        Activation::Purelin,
        Activation::Satlin,
        Activation::Satlins,
        Activation::Tansig,
        Activation::Onehot,
    ];

    #[inline(always)]
    pub fn table(self) -> &'static ActivationTable {
        match self {
            Activation::Hardlim => &HARDLIM,
            Activation::Hardlims => &HARDLIMS,
            Activation::Logsig => &LOGSIG,
            Activation::Purelin => &PURELIN,
            Activation::Satlin => &SATLIN,
            Activation::Satlins => &SATLINS,
            Activation::Tansig => &TANSIG,
            Activation::Onehot => &ONEHOT,
        }
    }

    /// Training output for `net`.
    #[inline(always)]
    pub fn act(self, net: f64) -> f64 { (self.table().act)(net) }

    /// Inference output for `net`; may be a hard threshold.
    #[inline(always)]
    pub fn infer(self, net: f64) -> f64 { (self.table().infer)(net) }

    #[inline(always)]
    pub fn deriv(self, net: f64, output: f64) -> f64 { (self.table().deriv)(net, output) }

    pub fn name(self) -> &'static str { self.table().name }

    /// Activation the neurons of a layer configured with `self` are built with.
    pub fn neuron_activation(self) -> Activation {
        match self {
            Activation::Onehot => Activation::Tansig,
            other => other,
        }
    }

    pub fn is_onehot(self) -> bool { self == Activation::Onehot }
}

impl FromStr for Activation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Activation::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| Error::UnknownActivation(s.to_string()))
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn names_round_trip_through_from_str() {
        for a in Activation::ALL {
            assert_eq!(a.name().parse::<Activation>().unwrap(), a);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        match "relu".parse::<Activation>() {
            Err(Error::UnknownActivation(name)) => assert_eq!(name, "relu"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn hard_thresholds_train_with_smooth_surrogates() {
        assert_relative_eq!(Activation::Hardlim.act(0.), 0.5);
        assert_eq!(Activation::Hardlim.infer(0.), 0.);
        assert_eq!(Activation::Hardlim.infer(0.3), 1.);

        assert_relative_eq!(Activation::Hardlims.act(0.5), 0.5f64.tanh());
        assert_eq!(Activation::Hardlims.infer(0.), -1.);
        assert_eq!(Activation::Hardlims.infer(2.), 1.);
    }

    #[test]
    fn saturating_functions_clamp_at_inference() {
        assert_eq!(Activation::Satlin.infer(-3.), 0.);
        assert_eq!(Activation::Satlin.infer(0.25), 0.25);
        assert_eq!(Activation::Satlin.infer(7.), 1.);

        assert_eq!(Activation::Satlins.infer(-3.), -1.);
        assert_eq!(Activation::Satlins.infer(-0.5), -0.5);
        assert_eq!(Activation::Satlins.infer(1.5), 1.);
    }

    #[test]
    fn derivatives_use_the_training_output() {
        let out = Activation::Logsig.act(1.);
        assert_relative_eq!(Activation::Logsig.deriv(1., out), out * (1. - out));

        let out = Activation::Tansig.act(-0.7);
        assert_relative_eq!(Activation::Tansig.deriv(-0.7, out), 1. - out * out);

        assert_eq!(Activation::Purelin.act(-2.5), -2.5);
        assert_eq!(Activation::Purelin.deriv(-2.5, -2.5), 1.);
    }

    #[test]
    fn onehot_layers_use_tansig_neurons() {
        assert_eq!(Activation::Onehot.neuron_activation(), Activation::Tansig);
        assert_eq!(Activation::Satlin.neuron_activation(), Activation::Satlin);
    }
}
