use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;
use std::sync::Arc;

use mailsift::model::part::MessagePart;
use mailsift::parser::mime::Reducer;
use mailsift::parser::tokens::{CharEstimateCounter, Cl100kCounter};

fn bench_reduce_eml(c: &mut Criterion) {
    let fixture_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("newsletter.eml");
    let message = mailsift::parser::eml::parse_eml(&fixture_path).unwrap();
    let reducer = Reducer::new(Arc::new(Cl100kCounter::new().unwrap()));

    c.bench_function("reduce_newsletter_eml", |b| {
        b.iter(|| reducer.reduce(&message.root, &message.snippet))
    });
}

fn bench_reduce_budget_stop(c: &mut Criterion) {
    let html = "<p>Lorem ipsum <a href=\"https://example.com/x?utm=1\">dolor</a> sit amet.</p>".repeat(200);
    let leaves: Vec<MessagePart> = (0..50)
        .map(|_| MessagePart::leaf("text/html", html.clone()))
        .collect();
    let root = MessagePart::multipart("multipart/mixed", leaves);

    let bpe = Reducer::new(Arc::new(Cl100kCounter::new().unwrap()));
    c.bench_function("reduce_large_html_cl100k", |b| b.iter(|| bpe.reduce(&root, "")));

    let estimate = Reducer::new(Arc::new(CharEstimateCounter));
    c.bench_function("reduce_large_html_estimate", |b| {
        b.iter(|| estimate.reduce(&root, ""))
    });
}

criterion_group!(benches, bench_reduce_eml, bench_reduce_budget_stop);
criterion_main!(benches);
