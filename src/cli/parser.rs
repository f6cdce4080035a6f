use std::time::{Duration, Instant};

use crate::{
    Res, config, info,
    query::{QueryParser, filter_differences, simple_parse},
    success, utils, warning,
};

const HOSTED_SAMPLE: &str = "melancholic indie rock with dreamy reverb from the 2000s";
const KEYWORD_SAMPLE: &str = "chill indie rock from the 90s";
const PARSE_TIMEOUT: Duration = Duration::from_secs(15);

/// `moodify test`: checks the hosted query parser and compares its answer
/// with keyword parsing. Never fails; problems are reported and the
/// keyword parser is shown instead.
pub async fn test_parser() -> Res<()> {
    info!("Testing query parser integration");

    let Some(api_key) = config::openai_api_key() else {
        warning!("No OpenAI API key found");
        println!("  Set your API key: export OPENAI_API_KEY=\"sk-your-key-here\"");
        println!("  Get one at: https://platform.openai.com/api-keys");
        println!();
        keyword_only();
        return Ok(());
    };

    success!("OpenAI API key detected");
    println!("  Key: {}", utils::mask_client_id(&api_key));
    println!();

    let parser = QueryParser::from_env();
    info!("Testing hosted parsing...");
    println!("  Sample query: \"{}\"", HOSTED_SAMPLE);

    let pb = utils::spinner("Asking the hosted model...");
    let started = Instant::now();
    let outcome = tokio::time::timeout(PARSE_TIMEOUT, parser.parse(HOSTED_SAMPLE)).await;
    let elapsed = started.elapsed();
    pb.finish_and_clear();

    let hosted = match outcome {
        Ok(Ok(filters)) => filters,
        Ok(Err(e)) => {
            parse_failed(&e.to_string(), elapsed);
            return Ok(());
        }
        Err(_) => {
            parse_failed(
                &format!("no answer within {} seconds", PARSE_TIMEOUT.as_secs()),
                elapsed,
            );
            return Ok(());
        }
    };

    success!("Hosted parsing succeeded (took {:.2?})", elapsed);
    info!("Hosted model results:");
    super::print_filters(&hosted);
    println!();

    let keyword = simple_parse(HOSTED_SAMPLE);
    info!("Keyword results:");
    super::print_filters(&keyword);
    println!();

    info!("Key differences:");
    let differences = filter_differences(&hosted, &keyword);
    if differences.is_empty() {
        println!("  Results are similar for this query");
    }
    for difference in differences {
        println!("  {}", difference);
    }
    println!();

    success!("Hosted query parsing is working, searches will use it.");
    Ok(())
}

fn parse_failed(reason: &str, elapsed: Duration) {
    warning!("Hosted parsing failed: {}", reason);
    println!("  Response time: {:.2?}", elapsed);
    println!();
    println!("  Possible issues:");
    println!("    Invalid API key, check https://platform.openai.com/api-keys");
    println!("    Billing not set up, OpenAI requires a payment method");
    println!("    Rate limit exceeded, wait a moment and try again");
    println!("    Network connectivity issues");
    println!();
    keyword_only();
}

fn keyword_only() {
    info!("Testing keyword parsing...");
    println!("  Sample query: \"{}\"", KEYWORD_SAMPLE);
    info!("Keyword results:");
    super::print_filters(&simple_parse(KEYWORD_SAMPLE));
    println!();
    info!("To enable hosted parsing:");
    println!("  1. Get an API key: https://platform.openai.com/api-keys");
    println!("  2. Set up billing");
    println!("  3. export OPENAI_API_KEY=\"your_key_here\"");
}
