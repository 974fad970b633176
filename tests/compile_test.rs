use std::io::Write;

use tempfile::NamedTempFile;
use wirecodegen::codegen::{Glue, Location, RenderContext, ServiceData, TransformPlan, compile};
use wirecodegen::{CompilerConfig, DesignLoader, Error, FileDesignLoader};

const BANK_DESIGN: &str = r#"
name: bank
path: /api
headers:
  type:
    object:
      "tenant:X-Tenant":
        type: {primitive: string}
types:
  Account:
    attribute:
      type:
        object:
          id: {type: {primitive: int}}
          name:
            type: {primitive: string}
            validation: {min_length: 1}
          tenant: {type: {primitive: string}}
          filters:
            type:
              map:
                key: {type: {primitive: string}}
                elem: {type: {primitive: string}}
      validation: {required: [id, name]}
    views:
      - name: default
        attributes: [{name: id}, {name: name}]
      - name: tiny
        attributes: [{name: id}]
services:
  - name: account
    base_path: /accounts
    errors:
      - name: not_found
        schema: {type: {primitive: string}}
        response: {status: 404}
    endpoints:
      - name: show
        payload: {type: {user: Account}}
        result: {type: {user: Account}}
        routes:
          - {verb: GET, path: "/{id}"}
          - {verb: GET, path: "//legacy/accounts/{id}"}
      - name: list
        payload: {type: {user: Account}}
        result:
          type:
            array: {type: {user: Account}}
        map_query_params: filters
        routes:
          - {verb: GET, path: ""}
"#;

fn design_file(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write temp file");
    file.flush().expect("Failed to flush temp file");
    file
}

async fn compile_bank() -> Vec<ServiceData> {
    let file = design_file(BANK_DESIGN);
    let api = FileDesignLoader::new(file.path())
        .load()
        .await
        .expect("design should load");
    compile(&api, &CompilerConfig::default()).expect("design should compile")
}

#[tokio::test]
async fn test_show_endpoint_end_to_end() {
    let services = compile_bank().await;
    assert_eq!(services.len(), 1);
    let show = &services[0].endpoints[0];
    assert_eq!(show.name, "show");

    let paths: Vec<&str> = show.routes.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/api/accounts/{id}", "/legacy/accounts/{id}"]);
    let names: Vec<&str> = show
        .routes
        .iter()
        .map(|r| r.path_template.name.as_str())
        .collect();
    assert_eq!(names, vec!["ShowAccountPath", "ShowAccountPath1"]);

    let payload = show.payload.as_ref().unwrap();
    assert_eq!(payload.path_params[0].name, "id");
    assert!(payload.query_params.is_empty());
    assert_eq!(payload.headers[0].wire_name, "X-Tenant");
    assert_eq!(payload.headers[0].var_name, "tenant");

    let body = payload.body.as_ref().unwrap();
    assert_eq!(body.type_name.as_deref(), Some("ShowRequestBody"));
    assert_eq!(body.validate.as_deref(), Some("ValidateShowRequestBody"));

    let init = payload.init.as_ref().unwrap();
    assert_eq!(init.name, "NewShowAccount");
    let args: Vec<(&str, Location)> = init
        .args
        .iter()
        .map(|a| (a.name.as_str(), a.location))
        .collect();
    assert_eq!(
        args,
        vec![
            ("body", Location::Body),
            ("id", Location::Path),
            ("tenant", Location::Header),
        ]
    );
    // optional header read into a pointer field from a pointer
    assert_eq!(init.args[2].glue, Glue::None);
    assert!(init.args[2].policy.field_pointer);

    let result = show.result.as_ref().unwrap();
    assert_eq!(result.views, vec!["default", "tiny"]);
    let response_body = result.responses[0].body.as_ref().unwrap();
    let views: Vec<&str> = response_body
        .views
        .iter()
        .map(|v| v.type_name.as_str())
        .collect();
    assert_eq!(views, vec!["ShowResponseBodyDefault", "ShowResponseBodyTiny"]);

    assert_eq!(show.errors.len(), 1);
    assert_eq!(show.errors[0].errors[0].name, "not_found");
}

#[tokio::test]
async fn test_map_query_params_and_array_result() {
    let services = compile_bank().await;
    let list = &services[0].endpoints[1];
    let payload = list.payload.as_ref().unwrap();
    let map_param = payload.map_query_param.as_ref().unwrap();
    assert_eq!(map_param.name, "filters");
    assert!(map_param.map_query_params);

    let body = payload.body.as_ref().unwrap();
    assert_eq!(body.type_name.as_deref(), Some("ListRequestBody"));

    let response = &list.result.as_ref().unwrap().responses[0];
    let body = response.body.as_ref().unwrap();
    assert!(body.type_name.is_none());
    assert_eq!(body.attribute.data_type.to_string(), "array<AccountResponseBody>");

    let init = response.init.as_ref().unwrap();
    let plan = &init.body_transform.as_ref().unwrap().plan;
    assert_eq!(
        plan,
        &TransformPlan::Array {
            elem: Box::new(TransformPlan::Helper {
                name: "unmarshalAccountResponseBodyToAccount".to_string()
            })
        }
    );
    assert!(
        services[0]
            .helpers
            .iter()
            .any(|h| h.name == "unmarshalAccountResponseBodyToAccount")
    );
}

#[tokio::test]
async fn test_synthesized_types_emitted_once() {
    let services = compile_bank().await;
    let mut names: Vec<&str> = services[0].types.iter().map(|t| t.name.as_str()).collect();
    let total = names.len();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), total);
    assert!(names.contains(&"AccountResponseBody"));
}

#[tokio::test]
async fn test_render_context_serializes_services() {
    let services = compile_bank().await;
    let context = RenderContext::from_services(&services).unwrap();
    assert_eq!(context.data["services"][0]["name"], "account");
    assert_eq!(
        context.data["services"][0]["endpoints"][0]["routes"][0]["path_template"]["format"],
        "/api/accounts/%v"
    );
}

#[tokio::test]
async fn test_invalid_design_reports_every_error() {
    let design = BANK_DESIGN.replace("\"/{id}\"", "\"/{id}/{missing}\"");
    let file = design_file(&design);
    let err = FileDesignLoader::new(file.path()).load().await.unwrap_err();
    let Error::Design(errors) = err else {
        panic!("expected design errors");
    };
    // the unknown wildcard and the mismatched alternative route
    assert_eq!(errors.len(), 2);
}
