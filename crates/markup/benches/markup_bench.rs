use criterion::{Criterion, black_box, criterion_group, criterion_main};
use markup::{Decoder, event_handler, href_component, tokenize};

const SMALL_ROWS: usize = 64;
const LARGE_ROWS: usize = 10_000;

fn make_rows(rows: usize) -> String {
    let mut out = String::with_capacity(rows * 96 + 16);
    out.push_str("<table>");
    for i in 0..rows {
        out.push_str(&format!(
            "<tr class=\"row\"><td>{i}</td><td><a href=\"item/{i}\" onclick=\"Select\">item &amp; {i}</a></td></tr>"
        ));
    }
    out.push_str("</table>");
    out
}

fn bench_tokenize_small(c: &mut Criterion) {
    let input = make_rows(SMALL_ROWS);
    c.bench_function("bench_tokenize_small", |b| {
        b.iter(|| black_box(tokenize(black_box(&input)).map(|t| t.len())));
    });
}

fn bench_decode_large(c: &mut Criterion) {
    let input = make_rows(LARGE_ROWS);
    let mut decoder = Decoder::new();
    decoder.add_transform(Box::new(event_handler));
    decoder.add_transform(Box::new(href_component));
    c.bench_function("bench_decode_large", |b| {
        b.iter(|| black_box(decoder.decode(black_box(&input)).is_ok()));
    });
}

criterion_group!(benches, bench_tokenize_small, bench_decode_large);
criterion_main!(benches);
