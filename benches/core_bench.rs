//! Benchmarks for galley core paths.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use galley::core::chef::{BakeOptions, Chef};
use galley::core::dish::Dish;
use galley::core::operation::OperationRegistry;
use galley::core::recipe;
use galley::core::types::{OpConfig, TypeTag};
use galley::magic::{Magic, MagicOptions};

const TEXT: &str = "the quick brown fox jumps over the lazy dog and keeps running ";

fn bench_dish_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("dish_string_to_buffer");
    for size in [64, 1024, 16384] {
        let input = "x".repeat(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| {
                let mut dish = Dish::from_string(black_box(input.clone()));
                black_box(dish.get_bytes().unwrap());
            });
        });
    }
    group.finish();
}

fn bench_recipe_parse(c: &mut Criterion) {
    let yaml = r#"
name: bench-recipe
recipe:
  - op: From Base64
    args: ["A-Za-z0-9+/=", true]
  - op: Label
    args: [top]
  - op: Find / Replace
    args: [{ string: "a", option: "Simple string" }, "b", true, false, true, false]
  - op: Conditional Jump
    args: ["a", false, top, 5]
  - op: To Hex
    args: [Space, 0]
"#;
    let registry = OperationRegistry::with_builtins();
    c.bench_function("recipe_parse_and_hydrate", |b| {
        b.iter(|| {
            let file = recipe::parse_recipe(black_box(yaml)).unwrap();
            black_box(recipe::hydrate(&file.recipe, &registry).unwrap());
        });
    });
}

fn bench_bake_pipeline(c: &mut Criterion) {
    let chef = Chef::with_builtins();
    let steps = vec![
        OpConfig::new("From Base64", vec![]),
        OpConfig::new("To Upper case", vec![]),
        OpConfig::new("SHA2", vec![]),
    ];
    let options = BakeOptions::returning(TypeTag::String);
    let mut group = c.benchmark_group("bake_pipeline");
    for repeat in [1, 16, 256] {
        let input = STANDARD.encode(TEXT.repeat(repeat));
        group.bench_with_input(BenchmarkId::from_parameter(repeat), &input, |b, input| {
            b.iter(|| {
                let result = chef.bake(Dish::from_string(input.clone()), &steps, &options);
                black_box(result);
            });
        });
    }
    group.finish();
}

fn bench_magic(c: &mut Criterion) {
    let magic = Magic::new(OperationRegistry::with_builtins(), MagicOptions::default()).unwrap();
    let input = STANDARD.encode(STANDARD.encode(TEXT));
    c.bench_function("magic_nested_base64", |b| {
        b.iter(|| black_box(magic.search(black_box(input.as_bytes()))));
    });
}

criterion_group!(
    benches,
    bench_dish_conversion,
    bench_recipe_parse,
    bench_bake_pipeline,
    bench_magic
);
criterion_main!(benches);
