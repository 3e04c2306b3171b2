use lumen_core::traits::Embedder;
use lumen_embed::{FakeEmbedder, FAKE_DIM};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[tokio::test]
async fn fake_embedder_shapes_and_determinism() {
    let embedder = FakeEmbedder::default();
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).await.expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), FAKE_DIM);
    assert_eq!(embedder.id(), "fake:256");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[tokio::test]
async fn shared_words_score_higher() {
    let embedder = FakeEmbedder::new(512);
    let query = embedder.embed_one("capital of France").await.unwrap();
    let near = embedder.embed_one("Paris is the capital of France.").await.unwrap();
    let far = embedder.embed_one("Lithium cells degrade with heat").await.unwrap();

    assert!(cosine(&query, &near) > cosine(&query, &far));
}

#[tokio::test]
async fn empty_text_embeds_to_zero_vector() {
    let embedder = FakeEmbedder::default();
    let v = embedder.embed_one("   ").await.unwrap();
    assert!(v.iter().all(|x| *x == 0.0));
}

#[tokio::test]
async fn zero_dimension_is_clamped() {
    let embedder = FakeEmbedder::new(0);
    assert_eq!(embedder.dim(), 1);
    assert_eq!(embedder.id(), "fake:1");
    let embs = embedder.embed_batch(&["any words at all".to_string()]).await.unwrap();
    assert_eq!(embs[0].len(), 1);
}
