use mockito::{Matcher, Server};
use moodify::{
    error::QueryError,
    query::{QueryParser, apply_model_output, filter_differences, simple_parse},
    types::Filters,
};

#[test]
fn simple_parse_defaults() {
    let f = simple_parse("something completely different");

    assert_eq!(f, Filters::default());
    assert_eq!((f.min_popularity, f.max_popularity), (20, 100));
}

#[test]
fn simple_parse_chill_lofi() {
    let f = simple_parse("Chill lofi beats to study to");

    assert_eq!(f.genres, vec!["chill", "ambient"]);
    assert_eq!(f.max_energy, 0.6);
    assert_eq!(f.max_danceability, 0.7);
}

#[test]
fn simple_parse_workout() {
    let f = simple_parse("gym workout");

    assert_eq!(f.min_energy, 0.7);
    assert_eq!(f.min_danceability, 0.7);
    assert_eq!((f.min_tempo, f.max_tempo), (120.0, 180.0));
}

#[test]
fn simple_parse_mood_and_era() {
    let f = simple_parse("sad 90s alternative rock");

    assert_eq!(f.max_valence, 0.5);
    assert_eq!((f.year_start, f.year_end), (1990, 1999));
    assert_eq!(f.genres, vec!["rock", "alternative"]);
}

#[test]
fn simple_parse_genres_capped_and_deduplicated() {
    let f = simple_parse("hip hop hip-hop jazz funk soul disco");

    assert_eq!(f.genres.len(), 3);
    assert_eq!(f.genres[0], "jazz");
    assert_eq!(f.genres.iter().filter(|g| *g == "hip-hop").count(), 1);
}

#[test]
fn model_output_overlays_base() {
    let content = r#"{"genres": ["Indie", "indie", "dream-pop"], "min_energy": 0.2, "max_energy": 0.5, "year_start": 2000, "year_end": 2009}"#;

    let f = apply_model_output(content, Filters::default());

    assert_eq!(f.genres, vec!["indie", "dream-pop"]);
    assert_eq!((f.min_energy, f.max_energy), (0.2, 0.5));
    assert_eq!((f.year_start, f.year_end), (2000, 2009));
    // Untouched fields keep their defaults
    assert_eq!(f.max_popularity, 100);
}

#[test]
fn model_output_in_code_fence() {
    let content = "```json\n{\"min_valence\": 0.8}\n```";

    let f = apply_model_output(content, Filters::default());
    assert_eq!(f.min_valence, 0.8);
}

#[test]
fn model_output_malformed_fields_keep_defaults() {
    let base = simple_parse("chill");
    let content = r#"{"min_energy": "high", "max_energy": null, "genres": "rock", "min_popularity": 40}"#;

    let f = apply_model_output(content, base.clone());

    assert_eq!(f.min_energy, base.min_energy);
    assert_eq!(f.max_energy, base.max_energy);
    assert_eq!(f.genres, base.genres);
    assert_eq!(f.min_popularity, 40);
}

#[test]
fn model_output_not_json_returns_base() {
    let base = simple_parse("happy");

    let f = apply_model_output("Sure! Here are some attributes.", base.clone());
    assert_eq!(f, base);
}

#[tokio::test]
async fn parser_without_key_uses_keywords() {
    let parser = QueryParser::new(None, "http://127.0.0.1:1/unused");

    assert!(!parser.is_hosted());
    let f = parser.parse("workout").await.unwrap();
    assert_eq!(f, simple_parse("workout"));
}

#[tokio::test]
async fn hosted_parser_success() {
    //* Given
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJsonString(
            r#"{"model": "gpt-4o-mini", "temperature": 0.2}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"choices": [{"message": {"role": "assistant", "content": "{\"genres\": [\"jazz\"], \"max_tempo\": 110}"}}]}"#,
        )
        .expect(1)
        .create_async()
        .await;

    //* When
    let parser = QueryParser::new(
        Some("sk-test".to_string()),
        format!("{}/v1/chat/completions", server.url()),
    );
    let f = parser.parse("late night jazz").await.unwrap();

    //* Then
    mock.assert_async().await;
    assert!(parser.is_hosted());
    assert_eq!(f.genres, vec!["jazz"]);
    assert_eq!(f.max_tempo, 110.0);
}

#[tokio::test]
async fn hosted_parser_error_status() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(401)
        .with_body("invalid api key")
        .create_async()
        .await;

    let parser = QueryParser::new(
        Some("sk-bad".to_string()),
        format!("{}/v1/chat/completions", server.url()),
    );
    let err = parser.parse("anything").await.unwrap_err();

    match err {
        QueryError::Status { status, message } => {
            assert_eq!(status.as_u16(), 401);
            assert_eq!(message, "invalid api key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn hosted_parser_empty_choices() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": []}"#)
        .create_async()
        .await;

    let parser = QueryParser::new(
        Some("sk-test".to_string()),
        format!("{}/v1/chat/completions", server.url()),
    );

    assert!(matches!(
        parser.parse("anything").await,
        Err(QueryError::EmptyResponse)
    ));
}

#[test]
fn filter_differences_for_identical_filters() {
    let f = simple_parse("chill indie rock from the 90s");

    assert!(filter_differences(&f, &f.clone()).is_empty());
}

#[test]
fn filter_differences_reports_each_aspect() {
    let keyword = simple_parse("melancholic indie rock with dreamy reverb from the 2000s");
    let hosted = apply_model_output(
        r#"{"genres": ["indie", "rock", "dream-pop"], "max_energy": 0.5, "max_valence": 0.4, "year_start": 2001}"#,
        Filters::default(),
    );

    let differences = filter_differences(&hosted, &keyword);

    assert_eq!(differences.len(), 4);
    assert_eq!(differences[0], "Genres: hosted model found 3, keywords found 2");
    assert_eq!(differences[3], "Era detection differs");
}
