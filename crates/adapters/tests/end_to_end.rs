use std::fs;

use blog_adapters::{
    create_llm_adapter, download_image, HttpCredentialVerifier, ReplicateImageGenerator,
};
use blog_core::config::{ImageConfig, LlmConfig};
use blog_core::{
    BlogDocument, BlogWorkflow, Credentials, PromptRegistry, Provider, VecLogSink, WorkflowError,
};
use mockito::Matcher;
use serde_json::json;
use tempfile::tempdir;

fn chat_reply(content: &str) -> String {
    json!({"choices": [{"message": {"role": "assistant", "content": content}}]}).to_string()
}

#[test]
fn generates_and_exports_a_post_over_http() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new();

    let stage_replies = [
        ("Research the latest trends", "Research notes"),
        ("Based on the research report", "Draft text"),
        ("Review the drafted blog content", "Reviewer feedback"),
        (
            "Revise the blog content",
            "Gardens of Tomorrow\nUrban gardening is growing.\n\nHere is why.",
        ),
    ];
    let chat_mocks: Vec<_> = stage_replies
        .iter()
        .map(|(marker, reply)| {
            server
                .mock("POST", "/v1/chat/completions")
                .match_body(Matcher::Regex(marker.to_string()))
                .with_status(200)
                .with_body(chat_reply(reply))
                .expect(1)
                .create()
        })
        .collect();

    let image_url = format!("{}/files/cover.png", server.url());
    let prediction = server
        .mock("POST", "/predictions")
        .match_body(Matcher::PartialJson(json!({"input": {"prompt": "urban gardening"}})))
        .with_status(201)
        .with_body(json!({"id": "p1", "status": "succeeded", "output": [image_url]}).to_string())
        .create();
    let image = server
        .mock("GET", "/files/cover.png")
        .with_status(200)
        .with_body([0x89u8, b'P', b'N', b'G'])
        .create();
    let openai_check = server
        .mock("GET", "/v1/models")
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_body("{}")
        .create();
    let replicate_check = server
        .mock("GET", "/models")
        .match_header("authorization", "Token r8-test")
        .with_status(200)
        .with_body("{}")
        .create();

    let verifier = HttpCredentialVerifier::new()?
        .with_base_url(Provider::OpenAi, format!("{}/v1", server.url()))
        .with_base_url(Provider::Replicate, server.url());

    let llm = LlmConfig {
        api_key: "sk-test".into(),
        base_url: server.url(),
        ..LlmConfig::for_provider(Provider::OpenAi)
    };
    let images = ReplicateImageGenerator::from_config(&ImageConfig {
        api_token: "r8-test".into(),
        base_url: server.url(),
        poll_interval_ms: 0,
        ..ImageConfig::default()
    })?;

    let prompts = PromptRegistry::new()?;
    let sink = VecLogSink::new();
    let workflow = BlogWorkflow::new(&prompts, &sink);

    workflow.verify_credentials(
        &verifier,
        &Credentials {
            llm_provider: Provider::OpenAi,
            llm_api_key: llm.api_key.clone(),
            replicate_token: Some("r8-test".into()),
        },
    )?;

    let model = create_llm_adapter(&llm)?;
    let artifact = workflow.generate(model.as_ref(), Some(&images), "urban gardening")?;
    assert_eq!(artifact.title(), "Gardens of Tomorrow");

    let url = artifact.image_url.clone().expect("image url");
    let attachment = download_image(&url)?;

    let temp = tempdir()?;
    let files = BlogDocument::from_artifact(&artifact).write_to(temp.path(), Some(&attachment))?;
    let markdown = fs::read_to_string(&files.document)?;
    assert!(markdown.starts_with("# urban gardening\n\n**Gardens of Tomorrow**\n\n"));
    assert!(markdown.contains("![urban gardening](urban gardening.png)"));
    assert!(markdown.ends_with("Urban gardening is growing.\n\nHere is why.\n"));
    assert_eq!(fs::read(files.image.expect("image path"))?, attachment.bytes);

    for mock in &chat_mocks {
        mock.assert();
    }
    prediction.assert();
    image.assert();
    openai_check.assert();
    replicate_check.assert();
    Ok(())
}

#[test]
fn rejected_replicate_token_stops_the_run() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new();
    let llm_check = server
        .mock("GET", "/openai/v1/models")
        .match_header("authorization", "Bearer gsk-good")
        .with_status(200)
        .create();
    let replicate_check = server
        .mock("GET", "/replicate/models")
        .match_header("authorization", "Token r8-bad")
        .with_status(401)
        .create();

    let verifier = HttpCredentialVerifier::new()?
        .with_base_url(Provider::Groq, format!("{}/openai/v1", server.url()))
        .with_base_url(Provider::Replicate, format!("{}/replicate", server.url()));

    let prompts = PromptRegistry::new()?;
    let sink = VecLogSink::new();
    let err = BlogWorkflow::new(&prompts, &sink)
        .verify_credentials(
            &verifier,
            &Credentials {
                llm_provider: Provider::Groq,
                llm_api_key: "gsk-good".into(),
                replicate_token: Some("r8-bad".into()),
            },
        )
        .unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::InvalidCredential {
            provider: Provider::Replicate
        }
    ));
    llm_check.assert();
    replicate_check.assert();
    Ok(())
}
