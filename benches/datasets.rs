use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub const DEFAULT_SEED: u64 = 0x_4352_5950_5441_5243; // fixed seed for stable benchmarks

#[derive(Clone, Debug)]
pub struct PutOp {
    pub query: String,
    pub raw: String,
}

/// Generates `results` raw outputs spread over `query_count` queries, each a mix of
/// `fields` integers, floats and words, like the output of `uptime` or `vmstat`.
pub fn generate_put_ops(seed: u64, results: usize, query_count: usize, fields: usize) -> Vec<PutOp> {
    assert!(query_count > 0);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut ops = Vec::with_capacity(results);

    for i in 0..results {
        let query = format!("query_{}", i % query_count);
        let raw = (0..fields)
            .map(|f| match f % 3 {
                0 => rng.random_range(0..100_000u32).to_string(),
                1 => format!("{:.3}", rng.random::<u32>() as f64 * 0.001),
                _ => format!("host-{}", rng.random_range(0..16u32)),
            })
            .collect::<Vec<_>>()
            .join(" ");

        ops.push(PutOp { query, raw });
    }

    ops
}
