#![allow(dead_code, reason = "each bench uses a different subset")]

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde_json::{Value, json};

/// Generates `n` random user profiles; the seed is fixed so every run and
/// every engine renders the same data.
pub fn generate_random_profiles(n: usize) -> Vec<Value> {
    let mut rng = StdRng::seed_from_u64(42);

    (0..n)
        .map(|_| {
            let items: Vec<Value> = (0..rng.random_range(3..10))
                .map(|_| {
                    json!({
                        "name": random_word(&mut rng, 3, 8),
                        "value": rng.random_range(10..1000),
                        "special": rng.random_bool(0.3),
                    })
                })
                .collect();

            json!({
                "user": {
                    "name": random_word(&mut rng, 5, 10),
                    "age": rng.random_range(18..80),
                    "active": rng.random_bool(0.7),
                },
                "items": items,
                "show_details": rng.random_bool(0.8),
                "has_access": rng.random_bool(0.6),
            })
        })
        .collect()
}

/// Builds a template source with `sections` nested sections, each holding a
/// few interpolations, for measuring compilation.
pub fn generate_nested_template(sections: usize) -> String {
    let mut source = String::new();
    for depth in 0..sections {
        source.push_str(&format!("{{{{#s{depth}}}}}\n  <p>{{{{a{depth}}}}} {{{{{{b{depth}}}}}}}</p>\n"));
    }
    for depth in (0..sections).rev() {
        source.push_str(&format!("{{{{/s{depth}}}}}\n"));
    }
    source
}

fn random_word(rng: &mut StdRng, min_len: usize, max_len: usize) -> String {
    let len = rng.random_range(min_len..=max_len);
    (0..len).map(|_| char::from(rng.random_range(b'a'..=b'z'))).collect()
}
