use std::sync::Arc;
use std::thread;

use textrec_text::{Normalizer, TfidfVectorizer};

#[test]
fn build_and_query_paths_clean_identically() -> anyhow::Result<()> {
    let normalizer = Arc::new(Normalizer::english());
    let raw = [
        "The cats were sitting on the mats.",
        "Dogs ran fast through the parks!",
        "Children love cookies & movies (2024)",
    ];
    let build_side = normalizer.clean_all(raw.iter().copied());

    let handles: Vec<_> = raw
        .iter()
        .map(|text| {
            let n = Arc::clone(&normalizer);
            let text = text.to_string();
            thread::spawn(move || n.clean(&text))
        })
        .collect();
    let query_side: Vec<String> = handles.into_iter().map(|h| h.join().expect("thread")).collect();

    assert_eq!(build_side, query_side);
    assert_eq!(build_side[0], "cat sitting mat");
    assert_eq!(build_side[2], "child love cookie movie");
    Ok(())
}

#[test]
fn cleaned_query_maps_into_fitted_space() -> anyhow::Result<()> {
    let normalizer = Normalizer::english();
    let docs = normalizer.clean_all(["The cat sat on the mat", "A dog ran fast", "Cats ran fast"]);
    let vectorizer = TfidfVectorizer::fit(&docs, 50)?;

    let query = vectorizer.transform(&[normalizer.clean("CATS!!! sat")]);
    let cols: Vec<usize> = query.row(0).iter().map(|(c, _)| c).collect();
    assert_eq!(cols.len(), 2);
    assert!(cols.contains(&vectorizer.term_index("cat").expect("cat")));
    assert!(cols.contains(&vectorizer.term_index("sat").expect("sat")));

    let empty = vectorizer.transform(&[normalizer.clean("the and of")]);
    assert_eq!(empty.nnz(), 0);
    Ok(())
}

#[test]
fn clean_is_idempotent_on_random_text() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    // fragments that exercise stop words and every suffix rule
    const PIECES: &[&str] = &[
        "the", "ours", "wills", "s", "es", "ies", "sses", "ches", "shes", "xes", "zzes", "us", "is",
        "ss", "a", "b", "go", "o", "cat", "box", "lad", "ana", "lys", "Wh", "ereas", "!", "'", "3", " ", " ",
    ];
    let normalizer = Normalizer::english();
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20_000 {
        let parts = rng.gen_range(1..12);
        let raw: String = (0..parts).map(|_| PIECES[rng.gen_range(0..PIECES.len())]).collect();
        let once = normalizer.clean(&raw);
        assert_eq!(normalizer.clean(&once), once, "{raw:?}");
    }
}
