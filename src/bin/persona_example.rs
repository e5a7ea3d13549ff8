//! Persona Segmentation Example
//!
//! This example demonstrates the full pipeline:
//! - Normalize happy-moment survey text
//! - Discover topics with LDA
//! - Aggregate topic weights per respondent
//! - Inspect the elbow curve and segment respondents into personas

use anyhow::Result;
use happy_segments::{
    MomentRecord, PersonaPipeline, PipelineConfig, RespondentDemographics,
};
use happy_segments::models::{KMeansConfig, LdaConfig};
use happy_segments::utils::SurveyDataset;
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::init();

    println!("=== Happy-Moment Persona Segmentation ===\n");

    let dataset = load_or_create_sample_data()?;
    println!(
        "Loaded {} moments from {} respondents\n",
        dataset.n_moments(),
        dataset.n_respondents()
    );

    let n_topics = 4;
    let config = PipelineConfig {
        lda: LdaConfig::new(n_topics)
            .alpha(0.1)
            .beta(0.01)
            .total_iterations(500)
            .burn_in(100)
            .thin(10)
            .n_chains(3)
            .seed(42),
        kmeans: KMeansConfig::new(3).n_starts(10).seed(42),
        k_max: 6,
    };

    let pipeline = PersonaPipeline::new(config)?;
    let report = pipeline.run(&dataset.moments, &dataset.demographics)?;

    println!(
        "Normalization: {} documents retained, {} dropped\n",
        report.retained_documents, report.dropped_documents
    );

    println!("=== Discovered Topics ===\n");
    for topic in &report.topics {
        let preview: Vec<String> = topic
            .top_words
            .iter()
            .take(6)
            .map(|(term, p)| format!("{}: {:.3}", term, p))
            .collect();
        println!(
            "Topic {} (prevalence {:.2}): [{}]",
            topic.topic_id,
            topic.prevalence,
            preview.join(", ")
        );
    }

    // Respondent feature table
    println!("\n=== Respondent Features ===\n");
    for row in &report.respondents {
        println!(
            "  Respondent {:3}: age {:2.0}, parent {}, married {}, dominant topic {}",
            row.respondent_id, row.age, row.parenthood, row.marital, row.dominant_topic
        );
    }

    // Elbow diagnostics for human k selection
    println!("\n=== Cluster Count Diagnostics ===\n");
    println!("  {:>2}  {:>14}  {:>14}", "k", "within-SS", "between-SS");
    for diag in &report.elbow {
        println!(
            "  {:>2}  {:>14.3}  {:>14.3}",
            diag.k, diag.total_within_ss, diag.between_ss
        );
    }
    println!("\n  (final k is chosen by eye from this curve)");

    // Final personas
    println!("\n=== Personas ===\n");
    for cluster in &report.segmentation.clusters {
        println!(
            "Cluster {} ({} members): age {:.1}, parent {:.2}, married {:.2}",
            cluster.cluster_id,
            cluster.member_count,
            cluster.centroid[0],
            cluster.centroid[1],
            cluster.centroid[2]
        );
        let indicators: Vec<String> = cluster.centroid[3..]
            .iter()
            .enumerate()
            .map(|(topic, share)| format!("topic {}: {:.2}", topic, share))
            .collect();
        println!("  dominant-topic mix: [{}]", indicators.join(", "));
    }

    println!("\n=== Example Complete ===");
    Ok(())
}

/// Load a dataset from disk or fall back to built-in sample data.
fn load_or_create_sample_data() -> Result<SurveyDataset> {
    let data_path = PathBuf::from("data/happy_moments.json");
    if data_path.exists() {
        println!("Loading dataset from {:?}...", data_path);
        return Ok(SurveyDataset::load_json(&data_path)?);
    }

    println!("Creating sample data...");

    let texts: Vec<(u64, &str)> = vec![
        // family dinners
        (1, "I cooked a big family dinner and everyone loved the pasta"),
        (1, "We ate homemade pizza together for my son's birthday dinner"),
        (2, "My daughter helped me bake a chocolate cake for dinner"),
        (2, "The whole family gathered and ate a wonderful holiday dinner"),
        (3, "I grilled burgers and we ate outside with the kids"),
        // outdoors and exercise
        (4, "I walked my dog along the river trail this morning"),
        (4, "We hiked to the top of the mountain and watched the sunset"),
        (5, "My morning run through the park felt amazing today"),
        (5, "I took a long bike ride and stopped at the lake"),
        (6, "Playing fetch with my dog at the park made me smile"),
        // work and achievement
        (7, "I finally finished a big project at work and my boss praised me"),
        (7, "My manager announced my promotion at the team meeting"),
        (8, "I passed my certification exam after months of studying"),
        (8, "A client thanked me personally for solving their problem at work"),
        (9, "I got a raise at work and celebrated with my wife"),
        // friends and social
        (10, "I met my old college friends for coffee and we laughed for hours"),
        (10, "My best friend surprised me with concert tickets"),
        (11, "We hosted a game night and my friends stayed until midnight"),
        (11, "A long phone call with my friend made my whole week"),
        (12, "My friends threw me a surprise party for my birthday"),
    ];

    let moments = texts
        .into_iter()
        .enumerate()
        .map(|(idx, (respondent_id, text))| MomentRecord {
            respondent_id,
            moment_id: idx as u64 + 1,
            raw_text: text.to_string(),
            sentence_count: 1,
            category_label: None,
        })
        .collect();

    let demographics = vec![
        demographics_row(1, 38.0, 1, 1),
        demographics_row(2, 41.0, 1, 1),
        demographics_row(3, 35.0, 1, 1),
        demographics_row(4, 27.0, 0, 0),
        demographics_row(5, 24.0, 0, 0),
        demographics_row(6, 30.0, 0, 1),
        demographics_row(7, 33.0, 0, 1),
        demographics_row(8, 29.0, 0, 0),
        demographics_row(9, 36.0, 1, 1),
        demographics_row(10, 25.0, 0, 0),
        demographics_row(11, 28.0, 0, 0),
        demographics_row(12, 26.0, 0, 0),
    ];

    Ok(SurveyDataset {
        moments,
        demographics,
    })
}

fn demographics_row(
    respondent_id: u64,
    age: f64,
    parenthood: u8,
    marital: u8,
) -> RespondentDemographics {
    RespondentDemographics {
        respondent_id,
        age,
        gender: Some(respondent_id as u8 % 2),
        parenthood,
        marital,
    }
}
