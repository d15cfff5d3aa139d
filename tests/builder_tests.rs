//! Builder Tests
//!
//! The reusable arena builder: field gating, borrow views, list assembly,
//! and reuse across resets.

use cinevault::movie::{Movie, MovieBuilder};

fn fill_movie(builder: &mut MovieBuilder, id: i64, title: &str, year: i32, genres: &[&str]) {
    builder.set_id(id);
    builder.set_title(title).unwrap();
    builder.set_director("Someone").unwrap();
    builder.set_release_year(year);
    builder.start_genres();
    for genre in genres {
        builder.add_genre(genre).unwrap();
    }
}

#[test]
fn test_current_movie_requires_all_fields() {
    let mut builder = MovieBuilder::new();
    assert!(builder.current_movie().is_none());

    builder.set_id(1);
    builder.set_title("Alien").unwrap();
    assert!(builder.current_movie().is_none());
    // id + title are enough for the summary projection
    assert!(builder.current_summary().is_some());

    builder.set_director("Ridley Scott").unwrap();
    builder.set_release_year(1979);
    assert!(builder.current_movie().is_none());

    builder.start_genres();
    builder.add_genre("Horror").unwrap();
    let movie = builder.current_movie().expect("complete movie");
    assert_eq!(movie.id, 1);
    assert_eq!(movie.title, "Alien");
    assert_eq!(movie.director, "Ridley Scott");
    assert_eq!(movie.release_year, 1979);
    assert_eq!(movie.genres, vec!["Horror"]);
}

#[test]
fn test_genres_keep_insertion_order() {
    let mut builder = MovieBuilder::new();
    fill_movie(&mut builder, 5, "Inception", 2010, &["Action", "Sci-Fi", "Thriller"]);
    let movie = builder.current_movie().unwrap();
    assert_eq!(movie.genres, vec!["Action", "Sci-Fi", "Thriller"]);
}

#[test]
fn test_has_flags_track_sets() {
    let mut builder = MovieBuilder::new();
    assert!(!builder.has_id() && !builder.has_title());
    builder.set_id(9);
    assert!(builder.has_id());
    builder.set_title("Heat").unwrap();
    assert!(builder.has_title());
    builder.reset();
    assert!(!builder.has_id() && !builder.has_title());
}

#[test]
fn test_reset_allows_reuse() {
    let mut builder = MovieBuilder::new();
    fill_movie(&mut builder, 1, "First", 2000, &["A"]);
    assert_eq!(builder.current_movie().unwrap().title, "First");

    builder.reset();
    fill_movie(&mut builder, 2, "Second", 2001, &["B", "C"]);
    let movie = builder.current_movie().unwrap();
    assert_eq!(movie.title, "Second");
    assert_eq!(movie.genres, vec!["B", "C"]);
}

#[test]
fn test_movie_list_materializes_owned_records() {
    let mut builder = MovieBuilder::new();
    fill_movie(&mut builder, 1, "First", 2000, &["A"]);
    builder.add_current_to_movie_list().unwrap();
    // flags cleared, same arena keeps growing
    assert!(!builder.has_id());
    fill_movie(&mut builder, 2, "Second", 2001, &["B", "C"]);
    builder.add_current_to_movie_list().unwrap();
    assert_eq!(builder.list_len(), 2);

    let movies = builder.take_movie_list();
    assert_eq!(
        movies,
        vec![
            Movie {
                id: 1,
                title: "First".to_owned(),
                director: "Someone".to_owned(),
                release_year: 2000,
                genres: vec!["A".to_owned()],
            },
            Movie {
                id: 2,
                title: "Second".to_owned(),
                director: "Someone".to_owned(),
                release_year: 2001,
                genres: vec!["B".to_owned(), "C".to_owned()],
            },
        ]
    );
}

#[test]
fn test_summary_list() {
    let mut builder = MovieBuilder::new();
    builder.set_id(1);
    builder.set_title("First").unwrap();
    builder.add_current_to_summary_list().unwrap();
    builder.set_id(2);
    builder.set_title("Second").unwrap();
    builder.add_current_to_summary_list().unwrap();

    let summaries = builder.take_summary_list();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].id, 1);
    assert_eq!(summaries[0].title, "First");
    assert_eq!(summaries[1].title, "Second");
}

#[test]
fn test_large_strings_cross_page_boundaries() {
    let mut builder = MovieBuilder::new();
    let big_title = "T".repeat(10_000);
    let big_genre = "G".repeat(5_000);
    builder.set_id(1);
    builder.set_title(&big_title).unwrap();
    builder.set_director("D").unwrap();
    builder.set_release_year(1999);
    builder.start_genres();
    builder.add_genre(&big_genre).unwrap();
    builder.add_genre("small").unwrap();

    let movie = builder.current_movie().unwrap();
    assert_eq!(movie.title.len(), 10_000);
    assert_eq!(movie.genres[0].len(), 5_000);
    assert_eq!(movie.genres[1], "small");
}

#[test]
fn test_view_copy_survives_reset() {
    let mut builder = MovieBuilder::new();
    fill_movie(&mut builder, 3, "Copied", 1990, &["X"]);
    let owned = builder.current_movie().unwrap().to_owned();
    builder.reset();
    assert_eq!(owned.title, "Copied");
    assert_eq!(owned.genres, vec!["X".to_owned()]);
}
