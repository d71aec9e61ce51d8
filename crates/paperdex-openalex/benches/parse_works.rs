use paperdex_openalex::{WorkRow, parse_page, work_to_paper};

fn synthetic_page(n: usize) -> String {
    let results: Vec<String> = (0..n)
        .map(|i| {
            format!(
                r#"{{"id":"https://openalex.org/W{i}","title":"Work {i}","publication_date":"2020-01-01",
                "primary_location":{{"landing_page_url":"https://arxiv.org/abs/2001.{i:05}v1"}},
                "abstract_inverted_index":{{"alpha":[0,4],"beta":[1],"gamma":[2],"delta":[3]}},
                "authorships":[{{"author":{{"display_name":"A {i}"}},"institutions":[]}}]}}"#
            )
        })
        .collect();
    format!(
        r#"{{"meta":{{"count":{n},"next_cursor":"abc"}},"results":[{}]}}"#,
        results.join(",")
    )
}

#[divan::bench]
fn parse_works_page(bencher: divan::Bencher) {
    let body = synthetic_page(200);
    bencher.bench(|| parse_page(&body).unwrap().items.len());
}

#[divan::bench]
fn convert_works(bencher: divan::Bencher) {
    let body = synthetic_page(200);
    bencher.bench(|| {
        let rows: Vec<WorkRow> = parse_page(&body).unwrap().items;
        rows.into_iter()
            .filter_map(|r| work_to_paper(r, false))
            .count()
    });
}

fn main() {
    divan::main();
}
