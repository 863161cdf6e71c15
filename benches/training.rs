use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mlproject::config::{ParamGrid, ParamValue};
use mlproject::training::{
    CatBoostRegressor, GridSearchCv, KNNRegressor, RandomForestRegressor, Regressor, XGBoostRegressor,
};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_regression_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);
    // Target as sum of features plus noise
    let y = x.sum_axis(ndarray::Axis(1)).mapv(|v| v + rng.gen::<f64>() * 0.1);
    (x, y)
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [500, 2000].iter() {
        let (x, y) = create_regression_data(*n_rows, 10);

        group.bench_with_input(BenchmarkId::new("random_forest", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| {
                let mut model = RandomForestRegressor::default();
                model.fit(black_box(x), black_box(y)).unwrap()
            })
        });
        group.bench_with_input(BenchmarkId::new("xgboost", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| {
                let mut model = XGBoostRegressor::default();
                model.fit(black_box(x), black_box(y)).unwrap()
            })
        });
        group.bench_with_input(BenchmarkId::new("catboost", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| {
                let mut model = CatBoostRegressor::default().with_iterations(100);
                model.fit(black_box(x), black_box(y)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_grid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_search");
    group.sample_size(10);

    let (x, y) = create_regression_data(1000, 10);
    let mut grid = ParamGrid::new();
    grid.insert(
        "n_neighbors".to_string(),
        vec![ParamValue::Int(5), ParamValue::Int(7), ParamValue::Int(9), ParamValue::Int(11)],
    );
    grid.insert(
        "weights".to_string(),
        vec![ParamValue::Str("uniform".into()), ParamValue::Str("distance".into())],
    );
    let search = GridSearchCv::new(grid);

    group.bench_function("knn_8_points", |b| {
        b.iter(|| search.fit(&KNNRegressor::default(), black_box(&x), black_box(&y)).unwrap())
    });

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict");

    // Train model once
    let (x_train, y_train) = create_regression_data(2000, 10);
    let mut model = XGBoostRegressor::default();
    model.fit(&x_train, &y_train).unwrap();

    for n_rows in [100, 1000, 10000].iter() {
        let (x, _) = create_regression_data(*n_rows, 10);
        group.bench_with_input(BenchmarkId::new("xgboost", n_rows), &x, |b, x| {
            b.iter(|| model.predict(black_box(x)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fit, bench_grid_search, bench_prediction);
criterion_main!(benches);
