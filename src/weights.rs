use std::{fs::File, io::{self, BufWriter, Write}, path::Path};

use rand::{rngs::StdRng, SeedableRng};

use crate::{Activation, Error, LayerSpec, Network, Result, Tokens};

/// Writes the stats block followed by the weights block.
pub fn save_network<W: Write + ?Sized>(network: &Network, w: &mut W) -> io::Result<()> {
    network.save_stats(w)?;
    network.save_weights(w)
}

pub fn save_network_file(network: &Network, path: &Path) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    save_network(network, &mut w)?;
    w.flush()?;
    Ok(())
}

/// Rebuilds a network from the text written by [`save_network`]. Blocks must
/// come in exactly the order they were saved in.
pub fn parse_network(text: &str) -> Result<Network> {
    let mut tokens = Tokens::new(text);

    let input_dimension = tokens.expect_usize("input dimension")?;
    let number_of_layers = tokens.expect_usize("number of layers")?;
    let mut specs = Vec::with_capacity(number_of_layers);
    for _ in 0..number_of_layers {
        let size = tokens.expect_usize("layer size")?;
        let activation: Activation = tokens.expect_str("layer type")?.parse()?;
        specs.push(LayerSpec::new(activation, size));
    }

    // the shape comes from the stats block, every weight is overwritten below
    let mut network = Network::new(&mut StdRng::seed_from_u64(0), input_dimension, &specs)?;

    let mut width = input_dimension;
    for (layer, spec) in specs.iter().enumerate() {
        for neuron in 0..spec.size {
            let found_layer = tokens.expect_usize("layer index")?;
            let found_neuron = tokens.expect_usize("neuron index")?;
            if (found_layer, found_neuron) != (layer, neuron) {
                return Err(Error::WeightFile(format!(
                    "expected layer {} neuron {}, found layer {} neuron {}", layer, neuron, found_layer, found_neuron
                )));
            }
            let inputs = tokens.expect_usize("number of inputs")?;
            if inputs != width {
                return Err(Error::WeightFile(format!(
                    "layer {} neuron {} has {} inputs, expected {}", layer, neuron, inputs, width
                )));
            }
            for j in 0..=inputs {
                network.set_weight(layer, neuron, j, tokens.expect_f64("weight")?);
            }
            network.set_fixed_sensitivity(layer, neuron, tokens.expect_f64("sensitivity")?);
        }
        width = spec.size;
    }

    if let Some(extra) = tokens.next_token() {
        return Err(Error::WeightFile(format!("unexpected '{}' after the last neuron", extra)));
    }
    Ok(network)
}

pub fn load_network_file(path: &Path) -> Result<Network> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Error::Io(io::Error::new(e.kind(), format!("could not open weight file {}: {}", path.display(), e)))
    })?;
    parse_network(&text)
}

/// Pretty JSON of the whole network, accumulators and Rprop state included.
pub fn save_snapshot(network: &Network, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(network)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_snapshot(path: &Path) -> Result<Network> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sample;

    fn trained_network() -> Network {
        let mut rng = StdRng::seed_from_u64(11);
        let mut network = Network::new(&mut rng, 3, &[
            LayerSpec::new(Activation::Logsig, 4),
            LayerSpec::new(Activation::Tansig, 2),
            LayerSpec::new(Activation::Onehot, 3),
        ]).unwrap();
        let sample = Sample::from_parts(vec![2.], vec![0.3, -1.7, 1e-9]);
        network.fire(&sample);
        network.set_sensitivity(&sample);
        network.adjust_weights(&sample, 0.37);
        network
    }

    fn save(network: &Network) -> String {
        let mut out = Vec::new();
        save_network(network, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn round_trip_is_bit_identical() {
        let original = trained_network();
        let loaded = parse_network(&save(&original)).unwrap();

        assert_eq!(loaded.input_dimension(), original.input_dimension());
        assert_eq!(loaded.specs(), original.specs());
        for (a, b) in original.layers().iter().zip(loaded.layers()) {
            for (na, nb) in a.neurons().iter().zip(b.neurons()) {
                let bits = |ws: &[f64]| ws.iter().map(|w| w.to_bits()).collect::<Vec<_>>();
                assert_eq!(bits(na.weights()), bits(nb.weights()));
                assert_eq!(na.sensitivity().to_bits(), nb.sensitivity().to_bits());
            }
        }
        assert_eq!(save(&loaded), save(&original));
    }

    #[test]
    fn out_of_order_neuron_is_rejected() {
        let text = "1\n2\n1\npurelin\n1\npurelin\n0\n0\n1\n0.5\n0.5\n0\n1\n1\n1\n0.5\n0.5\n0\n";
        assert!(matches!(parse_network(text), Err(Error::WeightFile(_))));
    }

    #[test]
    fn wrong_width_is_rejected() {
        let text = "1\n2\n1\npurelin\n1\npurelin\n0\n0\n2\n0.5\n0.5\n0.5\n0\n";
        assert!(matches!(parse_network(text), Err(Error::WeightFile(_))));
    }

    #[test]
    fn truncated_file_is_rejected() {
        let text = "1\n2\n1\npurelin\n1\npurelin\n0\n0\n1\n0.5\n";
        assert!(matches!(parse_network(text), Err(Error::MalformedData(_))));
    }

    #[test]
    fn unknown_layer_type_is_rejected() {
        assert!(matches!(parse_network("1\n2\n1\nsoftmax\n1\npurelin\n"), Err(Error::UnknownActivation(_))));
    }

    #[test]
    fn trailing_data_is_rejected() {
        let text = "1\n2\n1\npurelin\n1\npurelin\n0\n0\n1\n0.5\n0.5\n0\n1\n0\n1\n2\n3\n0\nextra\n";
        assert!(matches!(parse_network(text), Err(Error::WeightFile(_))));
    }

    #[test]
    fn snapshot_keeps_the_network() {
        let original = trained_network();
        let path = std::env::temp_dir().join(format!("backprop-snapshot-{}.json", std::process::id()));
        save_snapshot(&original, &path).unwrap();
        let back = load_snapshot(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(save(&back), save(&original));
        assert_eq!(back.specs(), original.specs());
        assert!(back.is_onehot());
    }
}
