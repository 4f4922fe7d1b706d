use anyhow::Context;

pub(crate) const DIGEST_SUBJECT: &str = "digest-subject";
pub(crate) const DIGEST_BODY: &str = "digest-body";

pub(crate) fn register_templates(registry: &mut handlebars::Handlebars<'_>) -> anyhow::Result<()> {
    registry
        .register_template_string(DIGEST_SUBJECT, r#"Fleet maintenance: {{summary}}"#)
        .context("registering digest-subject template")?;

    registry
        .register_template_string(
            DIGEST_BODY,
            r#"<html>
<head>
<style>
  body { font-family: sans-serif; color: #1d1d1f; }
  .body-text { font-size: 14px; }
  .identifier { font-family: monospace; background-color: #f0f0f2; padding: 1px 4px; }
  .muted { color: #6e6e73; font-size: 12px; }
  .banner { background-color: #b00020; color: #ffffff; padding: 4px 8px; font-weight: bold; }
  li.overdue { color: #b00020; }
  li.due-soon { color: #9a6700; }
</style>
</head>
<body>
<h2>Fleet maintenance digest</h2>
<p class="body-text">{{summary}}.</p>
{{#each vehicles}}
<div class="vehicle">
  <h3><span class="identifier">{{unit_label}}</span> &mdash; {{odometer}} mi</h3>
  {{#if last_updated}}<p class="muted">Record last updated {{last_updated}}</p>{{/if}}
  {{#if out_of_service}}<p class="banner">OUT OF SERVICE{{#if out_of_service_reason}}: {{out_of_service_reason}}{{/if}}</p>{{/if}}
  {{#if has_alerts}}
  <ul>
    {{#each alerts}}
    <li class="{{severity_class}}"><strong>{{label}}</strong>: {{message}}</li>
    {{/each}}
  </ul>
  {{/if}}
</div>
{{/each}}
<p class="muted">Generated {{generated_at}} &middot; batch {{batch_id}}</p>
</body>
</html>"#,
        )
        .context("registering digest-body template")?;

    Ok(())
}
