//! Benchmarks for the personalized signal sources
//!
//! Run with: cargo bench --package sources
//!
//! Uses a synthetic catalog so no export files are needed.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use data_loader::{Interaction, InteractionMatrix};
use sources::{
    neighborhood_scores, LatentFactorConfig, LatentFactorModel, PopularityRanker,
    SimilarityEngine, DEFAULT_QUANTITY_SCALE,
};

fn synthetic_interactions(users: usize, items: usize) -> Vec<Interaction> {
    let mut rows = Vec::new();
    for user in 0..users {
        for item in 0..items {
            // roughly 1 in 7 pairs observed, deterministic
            if (user * 31 + item * 17) % 7 == 0 {
                let quantity = 1.0 + ((user + item) % 5) as f32;
                rows.push(Interaction::new(format!("C{:05}", user), format!("{}{:04}", item % 9, item), quantity));
            }
        }
    }
    rows
}

fn bench_similar_users(c: &mut Criterion) {
    let matrix = InteractionMatrix::from_interactions(&synthetic_interactions(2000, 500));
    let engine = SimilarityEngine::new();

    c.bench_function("similar_users_blended", |b| {
        b.iter(|| black_box(engine.similar_users(&matrix, black_box("C00001"))))
    });
}

fn bench_neighborhood_scores(c: &mut Criterion) {
    let matrix = InteractionMatrix::from_interactions(&synthetic_interactions(2000, 500));
    let neighbors = SimilarityEngine::new().similar_users(&matrix, "C00001");
    let candidates: Vec<usize> = (0..matrix.item_count()).collect();

    c.bench_function("neighborhood_scores", |b| {
        b.iter(|| black_box(neighborhood_scores(&matrix, &neighbors, black_box(&candidates))))
    });
}

fn bench_latent_training(c: &mut Criterion) {
    let matrix = InteractionMatrix::from_interactions(&synthetic_interactions(300, 200));
    let config = LatentFactorConfig {
        factor_count: 32,
        epoch_count: 5,
        ..LatentFactorConfig::default()
    };

    c.bench_function("latent_factor_train", |b| {
        b.iter(|| black_box(LatentFactorModel::train(&matrix, &config)))
    });
}

fn bench_popularity(c: &mut Criterion) {
    let interactions = synthetic_interactions(2000, 500);

    c.bench_function("popularity_ranking", |b| {
        b.iter(|| {
            let ranker = PopularityRanker::from_interactions(black_box(&interactions), DEFAULT_QUANTITY_SCALE);
            black_box(ranker.diverse(10))
        })
    });
}

criterion_group!(
    benches,
    bench_similar_users,
    bench_neighborhood_scores,
    bench_latent_training,
    bench_popularity
);
criterion_main!(benches);
