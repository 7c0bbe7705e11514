// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builds a circuit and a breaker from a JSON configuration document.

use std::error::Error;

use fusebox::{Breaker, BreakerOptions, Circuit, CircuitOptions};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ServiceConfig {
    name: String,
    circuit: CircuitOptions,
    #[serde(default)]
    breaker: BreakerOptions,
}

const CONFIG: &str = r#"[
    {
        "name": "payments",
        "circuit": { "error_threshold": 3, "reset_timeout_ms": 10000 },
        "breaker": { "timeout_ms": 1500 }
    },
    {
        "name": "search",
        "circuit": { "error_threshold": 0.25, "volume_threshold": 20, "window_kind": "sliding" }
    }
]"#;

fn main() -> Result<(), Box<dyn Error>> {
    let services: Vec<ServiceConfig> = serde_json::from_str(CONFIG)?;

    for service in services {
        let circuit = Circuit::builder().name(service.name).options(service.circuit).build();
        let breaker = Breaker::<std::io::Error>::new(circuit).options(&service.breaker);

        println!(
            "{}: {:?} window, timeout {:?}, options {}",
            breaker.circuit().name(),
            breaker.circuit().window_kind(),
            breaker.timeout_duration(),
            serde_json::to_string(breaker.circuit().options())?,
        );
    }

    Ok(())
}
