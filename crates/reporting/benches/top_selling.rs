use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Duration, TimeZone, Utc};
use eafoods_core::{Aggregate, UserId};
use eafoods_preorders::{
    DeliveryAddress, Preorder, PreorderConfirmed, PreorderEvent, PreorderId, PreorderPlaced,
    SlotId,
};
use eafoods_products::ProductId;
use eafoods_reporting::{ReportPolicy, top_selling};

fn confirmed_preorders(count: usize, products: &[ProductId]) -> Vec<Preorder> {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
    let address = DeliveryAddress::parse("12 Bench Street").unwrap();

    (0..count)
        .map(|i| {
            let preorder_id = PreorderId::generate();
            let at = start + Duration::minutes(i as i64);
            let mut p = Preorder::empty(preorder_id);
            p.apply(&PreorderEvent::PreorderPlaced(PreorderPlaced {
                preorder_id,
                customer_id: UserId::new(),
                product_id: products[i % products.len()],
                slot_id: SlotId::generate(),
                quantity: (i % 7) as i64 + 1,
                delivery_address: address.clone(),
                occurred_at: at,
            }));
            if i % 3 != 0 {
                p.apply(&PreorderEvent::PreorderConfirmed(PreorderConfirmed {
                    preorder_id,
                    confirmed_by: UserId::new(),
                    occurred_at: at,
                }));
            }
            p
        })
        .collect()
}

fn bench_top_selling(c: &mut Criterion) {
    let mut group = c.benchmark_group("top_selling");
    let products: Vec<ProductId> = (0..50).map(|_| ProductId::generate()).collect();
    let since = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let now = since + Duration::days(365);

    for count in [1_000usize, 10_000, 100_000] {
        let preorders = confirmed_preorders(count, &products);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &preorders, |b, preorders| {
            b.iter(|| {
                top_selling(
                    black_box(preorders),
                    since,
                    now,
                    10,
                    ReportPolicy::ConfirmedAndPending,
                )
                .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_top_selling);
criterion_main!(benches);
