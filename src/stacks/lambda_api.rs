//! Lambda function behind an API Gateway REST endpoint
//!
//! role -> policy attachment, asset -> bucket -> archive object -> function,
//! rest api -> resource -> method -> integration, permission, deployment
//! (after the function) -> stage (after the deployment) -> `apiUrl` output.

use crate::config::{ApiConfig, ProjectConfig};
use anyhow::{Context, Result};
use serde_json::json;
use stackgraph::{
    AssetKind, BackendDescriptor, NodeHandle, OutputEntry, Properties, ProviderBlock, ScopeId,
    Stack, Value,
};

const BASIC_EXECUTION_POLICY: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// Populate `stack` from the project config
pub fn define(stack: &mut Stack, config: &ProjectConfig) -> Result<()> {
    let root = stack.root();

    let mut aws =
        ProviderBlock::new("aws", "hashicorp/aws").set("region", config.provider.region.as_str());
    if !config.provider.allowed_account_ids.is_empty() {
        aws = aws.set(
            "allowed_account_ids",
            config.provider.allowed_account_ids.clone(),
        );
    }
    if let Some(version) = &config.provider.version {
        aws = aws.version(version.as_str());
    }
    stack.provider(aws)?;

    if let Some(backend) = &config.backend {
        let mut descriptor = BackendDescriptor::new(backend.kind.as_str());
        for (name, value) in &backend.settings {
            let value = serde_json::to_value(value)
                .with_context(|| format!("Invalid backend setting '{name}'"))?;
            descriptor = descriptor.set(name.as_str(), value);
        }
        stack.set_backend(descriptor)?;
    }

    let function = define_function(stack, root, config)?;

    if let Some(api) = &config.api {
        define_api(stack, root, api, &function)?;
    }

    log::debug!(
        "Defined stack {} with {} resources",
        stack.name(),
        stack.registry().len()
    );
    Ok(())
}

fn define_function(stack: &mut Stack, root: ScopeId, config: &ProjectConfig) -> Result<NodeHandle> {
    let function = &config.function;

    let assume_role = Value::json_string(&json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Action": "sts:AssumeRole",
            "Principal": { "Service": "lambda.amazonaws.com" },
            "Effect": "Allow",
            "Sid": "",
        }],
    }))?;
    let role = stack.register(
        root,
        "lambda-exec-role",
        "aws_iam_role",
        Properties::new()
            .set("name", function.role_name.as_str())
            .set("assume_role_policy", assume_role),
    )?;

    stack.register(
        root,
        "lambda-managed-policy",
        "aws_iam_role_policy_attachment",
        Properties::new()
            .set("policy_arn", BASIC_EXECUTION_POLICY)
            .set("role", role.attr("name")),
    )?;

    let source = config.function_source();
    let asset = stack
        .asset(root, "lambda-asset", &source, AssetKind::Archive)
        .with_context(|| format!("Could not hash function source {}", source.display()))?;

    let bucket = stack.register(
        root,
        "bucket",
        "aws_s3_bucket",
        Properties::new().set("bucket_prefix", function.bucket_prefix.as_str()),
    )?;

    let archive = stack.register(
        root,
        "lambda-archive",
        "aws_s3_object",
        Properties::new()
            .set("bucket", bucket.attr("bucket"))
            .set(
                "key",
                Value::interpolate([
                    Value::from(format!("{}/", function.key_prefix)),
                    asset.file_name_value(),
                ]),
            )
            .set("source", asset.path_value()),
    )?;

    let handle = stack.register(
        root,
        "cdktf-lambda-function",
        "aws_lambda_function",
        Properties::new()
            .set("function_name", function.name.as_str())
            .set("handler", function.handler.as_str())
            .set("runtime", function.runtime.as_str())
            .set("role", role.attr("arn"))
            .set("s3_bucket", bucket.attr("bucket"))
            .set("s3_key", archive.attr("key")),
    )?;

    Ok(handle)
}

fn define_api(
    stack: &mut Stack,
    root: ScopeId,
    api: &ApiConfig,
    function: &NodeHandle,
) -> Result<()> {
    let rest_api = stack.register(
        root,
        "restApi",
        "aws_api_gateway_rest_api",
        Properties::new()
            .set("name", api.name.as_str())
            .set("description", api.description.as_str()),
    )?;

    let resource = stack.register(
        root,
        "resourceApi",
        "aws_api_gateway_resource",
        Properties::new()
            .set("rest_api_id", rest_api.attr("id"))
            .set("parent_id", rest_api.attr("root_resource_id"))
            .set("path_part", api.path_part.as_str()),
    )?;

    let method = stack.register(
        root,
        "postApi",
        "aws_api_gateway_method",
        Properties::new()
            .set("rest_api_id", rest_api.attr("id"))
            .set("resource_id", resource.attr("id"))
            .set("http_method", api.http_method.as_str())
            .set("authorization", "NONE"),
    )?;

    stack.register(
        root,
        "apiIntegration",
        "aws_api_gateway_integration",
        Properties::new()
            .set("rest_api_id", rest_api.attr("id"))
            .set("resource_id", resource.attr("id"))
            .set("http_method", method.attr("http_method"))
            .set("integration_http_method", api.http_method.as_str())
            .set("type", "AWS_PROXY")
            .set("uri", function.attr("invoke_arn")),
    )?;

    stack.register(
        root,
        "apig-lambda",
        "aws_lambda_permission",
        Properties::new()
            .set("statement_id", "AllowExecutionFromAPIGateway")
            .set("action", "lambda:InvokeFunction")
            .set("function_name", function.attr("function_name"))
            .set("principal", "apigateway.amazonaws.com")
            .set(
                "source_arn",
                Value::interpolate([
                    Value::from(rest_api.attr("execution_arn")),
                    Value::from("/*/*"),
                ]),
            ),
    )?;

    let deployment = stack.register(
        root,
        "deployment",
        "aws_api_gateway_deployment",
        Properties::new().set("rest_api_id", rest_api.attr("id")),
    )?;
    stack.add_dependency(&deployment, function)?;

    let stage = stack.register(
        root,
        "stage",
        "aws_api_gateway_stage",
        Properties::new()
            .set("rest_api_id", rest_api.attr("id"))
            .set("stage_name", api.stage.as_str())
            .set("deployment_id", deployment.attr("id")),
    )?;
    stack.add_dependency(&stage, &deployment)?;

    stack.declare(OutputEntry::new("apiUrl", stage.attr("invoke_url")).description("API URL"))?;
    Ok(())
}
