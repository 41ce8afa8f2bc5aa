//! Resolve command - run the configured resolver once

use crate::cache::{checkout_key, render_key};
use crate::cli::args::ResolveArgs;
use crate::config::Config;
use crate::error::{BookpubError, BookpubResult};
use crate::repo::Answer;
use crate::resolver::create_resolver;
use console::style;

/// Execute the resolve command
pub async fn execute(args: ResolveArgs, config: &Config) -> BookpubResult<()> {
    let resolver = create_resolver(&config.resolver, &config.fetch.git)?;
    let answers = resolver.resolve(&args.spec, true).await?;

    let Some(answer) = answers.last() else {
        return Err(BookpubError::Unresolvable(args.spec));
    };

    println!("{}", render_answer(answer, args.base_url.as_deref())?);
    Ok(())
}

fn render_answer(answer: &Answer, base_url: Option<&str>) -> BookpubResult<String> {
    let mut out = serde_json::to_string_pretty(&answer.to_document())?;

    if let Some(base_url) = base_url {
        out.push_str(&format!(
            "\n\n{} {}\n{} {}",
            style("checkout key:").dim(),
            checkout_key(answer.repo()),
            style("render key:  ").dim(),
            render_key(answer.repo(), base_url),
        ));
    }

    Ok(out)
}
