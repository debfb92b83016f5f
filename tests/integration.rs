
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fixtures::{builder, generate_random_whitespace, generate_random_whitespace_at_least_one, get_engine, get_engine_with};
use mustachio::{
    Configuration, InputType, Lambda, MustachioError, MustachioInterface, MustachioResult, Object, ParseErrorKind,
    ResolutionContext, Resolver, ThrowingMissingValueHandler, Value,
};

fn person() -> Value {
    Value::map([("name", "Edgar")])
}

struct Person {
    name: &'static str,
    age: i64,
}

impl Object for Person {
    fn member_names(&self) -> &'static [&'static str] {
        &["name", "age"]
    }

    fn member(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(self.name.into()),
            1 => Some(Value::Int(self.age)),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
#[ntest::timeout(100)]
fn test_basic_interpolation() {
    let engine = get_engine(&[("greeting", "Hello {{foo}} and {{bar.name}}!")]);
    let data = Value::map([("foo", Value::from("me")), ("bar", person())]);

    let rendered = engine.render("greeting", data).unwrap();
    assert_eq!(rendered, "Hello me and Edgar!");
}

#[test]
#[ntest::timeout(100)]
fn test_whitespace_inside_tags_is_ignored() {
    let template = format!(
        "{{{{#{}items{}}}}}[{{{{{}.{}}}}}]{{{{/{}items{}}}}}",
        generate_random_whitespace(),
        generate_random_whitespace(),
        generate_random_whitespace(),
        generate_random_whitespace(),
        generate_random_whitespace(),
        generate_random_whitespace(),
    );
    let engine = get_engine(&[("t", template.as_str())]);
    let data = Value::map([("items", Value::list(["a", "b"]))]);

    assert_eq!(engine.render("t", data).unwrap(), "[a][b]", "template was {template:?}");
}

#[test]
#[ntest::timeout(100)]
fn test_whitespace_inside_key_is_rejected() {
    let template = format!(
        "{{{{a{}b}}}}",
        generate_random_whitespace_at_least_one()
    );
    let engine = get_engine(&[("t", template.as_str())]);

    let err = engine.get_template("t").unwrap_err();
    assert!(
        matches!(&err, MustachioError::Parse(e) if matches!(e.kind, ParseErrorKind::InvalidTag { .. })),
        "unexpected error {err:?}"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_iteration_metadata() {
    let engine = get_engine(&[("t", "{{#numbers}}la{{iterIndex}}{{iterHasNext}}|{{/numbers}}")]);
    let data = Value::map([("numbers", Value::list([1, 2, 3]))]);

    assert_eq!(engine.render("t", data).unwrap(), "la1true|la2true|la3false|");
}

#[test]
#[ntest::timeout(100)]
fn test_iteration_alias() {
    let engine = get_engine(&[(
        "t",
        "{{#items}}{{iter.index}}:{{.}}{{#iter.hasNext}},{{/iter.hasNext}}{{/items}}",
    )]);
    let data = Value::map([("items", Value::list(["a", "b", "c"]))]);

    assert_eq!(engine.render("t", data).unwrap(), "1:a,2:b,3:c");
}

#[test]
#[ntest::timeout(100)]
fn test_iteration_metadata_does_not_shadow_outer_keys() {
    let engine = get_engine(&[(
        "t",
        "{{#items}}{{position}}/{{index}}/{{isFirst}}/{{iter.position}};{{/items}}",
    )]);
    let data = Value::map([
        ("position", Value::from("CEO")),
        ("index", Value::from("home")),
        ("isFirst", Value::from("outer")),
        ("items", Value::list([1, 2])),
    ]);

    assert_eq!(engine.render("t", data).unwrap(), "CEO/home/outer/0;CEO/home/outer/1;");
}

#[test]
#[ntest::timeout(100)]
fn test_custom_iteration_alias() {
    let configuration = Configuration {
        iteration_metadata_alias: "meta".to_string(),
        ..Configuration::default()
    };
    let engine = get_engine_with(
        configuration,
        &[(
            "t",
            "{{#items}}{{meta.position}}{{#meta.isFirst}}<{{/meta.isFirst}}{{#meta.isLast}}>{{/meta.isLast}}{{/items}}",
        )],
    );
    let data = Value::map([("items", Value::list([true, true, true]))]);

    assert_eq!(engine.render("t", data).unwrap(), "0<12>");
}

#[test]
#[ntest::timeout(100)]
fn test_inverted_section() {
    let engine = get_engine(&[("t", "{{^items}}No items{{/items}}")]);

    let empty = Value::map([("items", Value::list(Vec::<Value>::new()))]);
    assert_eq!(engine.render("t", empty).unwrap(), "No items");
    let missing = Value::map([("other", 1)]);
    assert_eq!(engine.render("t", missing).unwrap(), "No items");
    let full = Value::map([("items", Value::list([1]))]);
    assert_eq!(engine.render("t", full).unwrap(), "");
}

#[test]
#[ntest::timeout(100)]
fn test_section_truthiness() {
    let engine = get_engine(&[("t", "{{#v}}yes{{/v}}")]);

    for (value, expected) in [
        (Value::from(""), "yes"),
        (Value::Int(0), "yes"),
        (Value::map(Vec::<(String, Value)>::new()), "yes"),
        (Value::Bool(true), "yes"),
        (Value::Bool(false), ""),
        (Value::Null, ""),
        (Value::list(Vec::<Value>::new()), ""),
    ] {
        let data = Value::map([("v", value.clone())]);
        assert_eq!(engine.render("t", data).unwrap(), expected, "section over {value:?}");
    }
}

#[test]
#[ntest::timeout(100)]
fn test_section_pushes_map_scope() {
    let engine = get_engine(&[("t", "{{#bar}}{{name}} from {{city}}{{/bar}}")]);
    let data = Value::map([
        ("city", Value::from("Prague")),
        ("bar", person()),
    ]);

    assert_eq!(engine.render("t", data).unwrap(), "Edgar from Prague");
}

#[test]
#[ntest::timeout(100)]
fn test_inheritance() {
    let engine = get_engine(&[
        ("super", "Hello {{$insert}}Martin{{/insert}}"),
        ("sub", "And now... {{<super}} {{$insert}}{{name}}{{/insert}} {{/super}}!"),
    ]);

    assert_eq!(engine.render("sub", person()).unwrap(), "And now... Hello Edgar!");
    assert_eq!(engine.render("super", person()).unwrap(), "Hello Martin");
}

#[test]
#[ntest::timeout(100)]
fn test_multi_level_inheritance() {
    let engine = get_engine(&[
        ("grand", "<{{$a}}A{{/a}}|{{$b}}B{{/b}}|{{$c}}C{{/c}}>"),
        ("parent", "{{<grand}}{{$a}}PA{{/a}}{{$b}}PB{{/b}}{{/grand}}"),
        ("child", "{{<parent}}{{$a}}CA{{/a}}{{/parent}}"),
    ]);

    assert_eq!(engine.render("child", Value::Null).unwrap(), "<CA|PB|C>");
    assert_eq!(engine.render("parent", Value::Null).unwrap(), "<PA|PB|C>");
}

#[test]
#[ntest::timeout(100)]
fn test_unterminated_section_fails_to_compile() {
    let engine = get_engine(&[("bad", "Hello {{#foo}} and...")]);

    let err = engine.get_template("bad").unwrap_err();
    let MustachioError::Parse(parse) = &err else {
        panic!("expected a parse error, got {err:?}");
    };
    assert_eq!(parse.template, "bad");
    assert!(
        matches!(&parse.kind, ParseErrorKind::UnterminatedSection { .. }),
        "unexpected kind {:?}",
        parse.kind
    );
    // Rendering surfaces the same error.
    assert_eq!(engine.render("bad", Value::Null).unwrap_err(), err);
}

#[test]
#[ntest::timeout(100)]
fn test_mismatched_section_end() {
    let engine = get_engine(&[("bad", "{{#a}}{{/b}}")]);

    let err = engine.get_template("bad").unwrap_err();
    assert!(
        matches!(&err, MustachioError::Parse(e) if matches!(e.kind, ParseErrorKind::InvalidSectionEnd { .. })),
        "unexpected error {err:?}"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_missing_template() {
    let engine = get_engine(&[]);

    assert_eq!(
        engine.render("nope", Value::Null).unwrap_err(),
        MustachioError::TemplateNotFound {
            template_name: "nope".to_string()
        }
    );
}

#[test]
#[ntest::timeout(100)]
fn test_invalid_partial_reference() {
    let engine = get_engine(&[("t", "line one\n{{>nope}} trailing")]);

    assert_eq!(
        engine.render("t", Value::Null).unwrap_err(),
        MustachioError::InvalidReference {
            reference: "nope".to_string(),
            template_name: "t".to_string(),
            line: 2,
        }
    );
}

#[test]
#[ntest::timeout(100)]
fn test_partial_inherits_scope() {
    let engine = get_engine(&[
        ("page", "{{#person}}{{>card}}{{/person}}"),
        ("card", "{{name}} ({{site}})"),
    ]);
    let data = Value::map([("site", Value::from("example.org")), ("person", person())]);

    assert_eq!(engine.render("page", data).unwrap(), "Edgar (example.org)");
}

#[test]
#[ntest::timeout(100)]
fn test_standalone_partial_is_indented() {
    let engine = get_engine(&[("t", "Begin\n  {{>p}}\nEnd"), ("p", "a\nb\n")]);

    assert_eq!(engine.render("t", Value::Null).unwrap(), "Begin\n  a\n  b\nEnd");
}

#[test]
#[ntest::timeout(100)]
fn test_standalone_lines_removed() {
    let engine = get_engine(&[("t", "Begin.\n{{#a}}\nX\n  {{/a}}  \n{{! note }}\nEnd.")]);
    let data = Value::map([("a", true)]);

    assert_eq!(engine.render("t", data).unwrap(), "Begin.\nX\nEnd.");
}

#[test]
#[ntest::timeout(100)]
fn test_standalone_lines_kept_when_disabled() {
    let configuration = Configuration {
        remove_standalone_lines: false,
        ..Configuration::default()
    };
    let engine = get_engine_with(configuration, &[("t", "Begin.\n{{#a}}\nX\n{{/a}}\nEnd.")]);
    let data = Value::map([("a", true)]);

    assert_eq!(engine.render("t", data).unwrap(), "Begin.\n\nX\n\nEnd.");
}

#[test]
#[ntest::timeout(100)]
fn test_interpolation_lines_are_never_standalone() {
    let engine = get_engine(&[("t", "A\n  {{v}}  \nB")]);
    let data = Value::map([("v", "")]);

    assert_eq!(engine.render("t", data).unwrap(), "A\n    \nB");
}

#[test]
#[ntest::timeout(100)]
fn test_mixed_lines_untouched() {
    let engine = get_engine(&[("t", "| {{#a}}X{{/a}} |\n")]);
    let data = Value::map([("a", true)]);

    assert_eq!(engine.render("t", data).unwrap(), "| X |\n");
}

/// Builds `depth` nested maps, each holding the next under `child`; the
/// innermost holds `child: false` so the recursion stops there.
fn nested(depth: usize) -> Value {
    (0..depth).fold(Value::map([("child", false)]), |inner, _| {
        Value::map([("child", inner)])
    })
}

#[test]
#[ntest::timeout(1000)]
fn test_recursion_limit() {
    for limit in 0..4_usize {
        let configuration = Configuration {
            recursion_limit: limit,
            ..Configuration::default()
        };
        let engine = get_engine_with(configuration, &[("node", "{{#child}}+{{>node}}{{/child}}")]);

        let within = engine.render("node", nested(limit)).unwrap();
        assert_eq!(within, "+".repeat(limit), "depth {limit} within limit {limit}");

        let err = engine.render("node", nested(limit + 1)).unwrap_err();
        assert_eq!(
            err,
            MustachioError::RecursiveInvocationLimitExceeded {
                limit,
                template_name: "node".to_string(),
            },
            "depth {} over limit {limit}",
            limit + 1
        );
    }
}

#[test]
#[ntest::timeout(100)]
fn test_unescaped_values() {
    let engine = get_engine(&[("t", "{{html}}|{{{html}}}|{{&html}}")]);
    let data = Value::map([("html", "<b>&\"'</b>")]);

    assert_eq!(
        engine.render("t", data).unwrap(),
        "&lt;b&gt;&amp;&quot;&#39;&lt;/b&gt;|<b>&\"'</b>|<b>&\"'</b>"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_skip_value_escaping() {
    let configuration = Configuration {
        skip_value_escaping: true,
        ..Configuration::default()
    };
    let engine = get_engine_with(configuration, &[("t", "{{html}}")]);
    let data = Value::map([("html", "<i>")]);

    assert_eq!(engine.render("t", data).unwrap(), "<i>");
}

#[test]
#[ntest::timeout(100)]
fn test_configured_delimiters() {
    let configuration = Configuration {
        start_delimiter: "<%".to_string(),
        end_delimiter: "%>".to_string(),
        ..Configuration::default()
    };
    let engine = get_engine_with(configuration, &[("t", "<%#bar%><%name%><%/bar%> {{name}}")]);
    let data = Value::map([("bar", person())]);

    assert_eq!(engine.render("t", data).unwrap(), "Edgar {{name}}");
}

#[test]
#[ntest::timeout(100)]
fn test_delimiter_switch() {
    let engine = get_engine(&[("t", "{{a}} {{=<% %>=}}<%a%> {{a}} <%={{ }}=%>{{a}}")]);
    let data = Value::map([("a", "x")]);

    assert_eq!(engine.render("t", data).unwrap(), "x x {{a}} x");
}

#[test]
#[ntest::timeout(100)]
fn test_missing_values_render_empty() {
    let engine = get_engine(&[("t", "[{{missing}}][{{a.b.c}}]")]);
    let data = Value::map([("a", Value::map([("b", 1)]))]);

    assert_eq!(engine.render("t", data).unwrap(), "[][]");
}

#[test]
#[ntest::timeout(100)]
fn test_strict_missing_values() {
    let engine = builder(&[("t", "ok: {{present}}\n{{missing}}")])
        .missing_value_handler(ThrowingMissingValueHandler)
        .build()
        .unwrap();
    let data = Value::map([("present", 1)]);

    assert_eq!(
        engine.render("t", data).unwrap_err(),
        MustachioError::MissingValue {
            key: "missing".to_string(),
            template_name: "t".to_string(),
            line: 2,
        }
    );
}

#[test]
#[ntest::timeout(100)]
fn test_list_index_and_this() {
    let engine = get_engine(&[("t", "{{items.1}} {{#items}}{{this}}{{/items}}")]);
    let data = Value::map([("items", Value::list(["a", "b", "c"]))]);

    assert_eq!(engine.render("t", data).unwrap(), "b abc");
}

#[test]
#[ntest::timeout(100)]
fn test_object_members() {
    let engine = get_engine(&[("t", "{{#person}}{{name}} is {{age}}{{/person}} / {{person.name}}")]);
    let data = Value::map([(
        "person",
        Value::object(Person {
            name: "Edgar",
            age: 42,
        }),
    )]);

    assert_eq!(engine.render("t", data).unwrap(), "Edgar is 42 / Edgar");
}

#[test]
#[ntest::timeout(100)]
fn test_global_data() {
    let engine = builder(&[("t", "{{site}}: {{title}}")])
        .add_global_data("site", "Example")
        .add_global_data("title", "shadowed")
        .build()
        .unwrap();
    let data = Value::map([("title", "Home")]);

    assert_eq!(engine.render("t", data).unwrap(), "Example: Home");
}

#[test]
#[ntest::timeout(100)]
fn test_literal_lambda_section() {
    let engine = get_engine(&[("t", "{{#wrap}}Hi {{name}}{{/wrap}}")]);
    let data = Value::map([
        ("name", Value::from("Edgar")),
        (
            "wrap",
            Value::lambda(|text: &str| -> MustachioResult<String> {
                assert_eq!(text, "Hi {{name}}");
                Ok(format!("<b>{text}</b>"))
            }),
        ),
    ]);

    assert_eq!(engine.render("t", data).unwrap(), "<b>Hi Edgar</b>");
}

struct Shout;

impl Lambda for Shout {
    fn invoke(&self, text: &str) -> MustachioResult<String> {
        Ok(text.to_uppercase())
    }

    fn input_type(&self) -> InputType {
        InputType::Processed
    }
}

struct Verbatim;

impl Lambda for Verbatim {
    fn invoke(&self, _: &str) -> MustachioResult<String> {
        Ok("{{name}} & co".to_string())
    }

    fn is_return_value_interpolated(&self) -> bool {
        false
    }
}

#[test]
#[ntest::timeout(100)]
fn test_processed_lambda_section() {
    let engine = get_engine(&[("t", "{{#shout}}hi {{name}}{{/shout}}")]);
    let data = Value::map([("name", Value::from("Edgar")), ("shout", Value::lambda(Shout))]);

    assert_eq!(engine.render("t", data).unwrap(), "HI EDGAR");
}

#[test]
#[ntest::timeout(100)]
fn test_uninterpolated_lambda() {
    let engine = get_engine(&[("t", "{{#v}}ignored{{/v}}|{{v}}")]);
    let data = Value::map([("name", Value::from("Edgar")), ("v", Value::lambda(Verbatim))]);

    assert_eq!(engine.render("t", data).unwrap(), "{{name}} & co|{{name}} &amp; co");
}

#[test]
#[ntest::timeout(100)]
fn test_value_lambda_is_interpolated_and_escaped() {
    let engine = get_engine(&[("t", "Hello, {{lambda}}!")]);
    let data = Value::map([
        ("planet", Value::from("<world>")),
        (
            "lambda",
            Value::lambda(|_: &str| -> MustachioResult<String> { Ok("{{{planet}}}".to_string()) }),
        ),
    ]);

    assert_eq!(engine.render("t", data).unwrap(), "Hello, &lt;world&gt;!");
}

#[test]
#[ntest::timeout(100)]
fn test_lambda_error_propagates() {
    let engine = get_engine(&[("t", "{{#fail}}x{{/fail}}")]);
    let data = Value::map([(
        "fail",
        Value::lambda(|_: &str| -> MustachioResult<String> {
            Err(MustachioError::Lambda {
                message: "boom".to_string(),
            })
        }),
    )]);

    assert_eq!(
        engine.render("t", data).unwrap_err(),
        MustachioError::Lambda {
            message: "boom".to_string()
        }
    );
}

/// Answers one fixed name on every context object.
struct FixedResolver {
    priority: i32,
    name: &'static str,
    value: &'static str,
}

impl Resolver for FixedResolver {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn resolve(&self, _: Option<&Value>, name: &str, _: &mut ResolutionContext) -> MustachioResult<Option<Value>> {
        Ok((name == self.name).then(|| self.value.into()))
    }
}

#[test]
#[ntest::timeout(100)]
fn test_resolver_priority() {
    let data = || Value::map([("name", "from map")]);

    let high = builder(&[("t", "{{name}}")])
        .add_resolver(FixedResolver {
            priority: 2000,
            name: "name",
            value: "from resolver",
        })
        .build()
        .unwrap();
    assert_eq!(high.render("t", data()).unwrap(), "from resolver");

    let low = builder(&[("t", "{{name}}")])
        .add_resolver(FixedResolver {
            priority: 10,
            name: "name",
            value: "from resolver",
        })
        .build()
        .unwrap();
    assert_eq!(low.render("t", data()).unwrap(), "from map");
}

/// Registers a release callback for every name it is asked about, then
/// declines; optionally fails on `fail`.
struct PooledResolver {
    released: Arc<AtomicUsize>,
}

impl Resolver for PooledResolver {
    fn priority(&self) -> i32 {
        5000
    }

    fn resolve(&self, _: Option<&Value>, name: &str, resolution: &mut ResolutionContext) -> MustachioResult<Option<Value>> {
        let released = Arc::clone(&self.released);
        resolution.register_release_callback(move || {
            released.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        if name == "fail" {
            return Err(MustachioError::Resolver {
                message: "unavailable".to_string(),
            });
        }
        Ok(None)
    }
}

#[test]
#[ntest::timeout(100)]
fn test_release_callbacks_run_after_render() {
    let released = Arc::new(AtomicUsize::new(0));
    let engine = builder(&[("ok", "{{a}}"), ("bad", "{{fail}}")])
        .add_resolver(PooledResolver {
            released: Arc::clone(&released),
        })
        .build()
        .unwrap();

    assert_eq!(engine.render("ok", Value::map([("a", "x")])).unwrap(), "x");
    let after_ok = released.load(Ordering::SeqCst);
    assert!(after_ok > 0, "callbacks should have run");

    let err = engine.render("bad", Value::map([("a", "x")])).unwrap_err();
    assert_eq!(
        err,
        MustachioError::Resolver {
            message: "unavailable".to_string()
        }
    );
    assert_eq!(
        released.load(Ordering::SeqCst),
        after_ok + 1,
        "the callback registered before the failure still runs"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_hints_do_not_change_output() {
    let templates = [
        ("t", "{{name}}|{{#items}}{{.}}{{name}}{{/items}}|{{person.name}}|{{#person}}{{age}}{{/person}}"),
    ];
    let with_hints = get_engine(&templates);
    let without_hints = get_engine_with(
        Configuration {
            hints_enabled: false,
            ..Configuration::default()
        },
        &templates,
    );

    let shapes = [
        Value::map([
            ("name", Value::from("map")),
            ("items", Value::list([1, 2])),
            ("person", Value::map([("name", "Ann"), ("age", "7")])),
        ]),
        Value::map([
            ("name", Value::from("again")),
            ("items", Value::list([Value::map([("name", "inner")])])),
            (
                "person",
                Value::object(Person {
                    name: "Edgar",
                    age: 42,
                }),
            ),
        ]),
        Value::object(Person {
            name: "top",
            age: 1,
        }),
    ];

    // Render each shape twice so the second pass runs on installed hints.
    for _ in 0..2 {
        for data in &shapes {
            assert_eq!(
                with_hints.render("t", data.clone()).unwrap(),
                without_hints.render("t", data.clone()).unwrap(),
                "data {data:?}"
            );
        }
    }
}

#[test]
#[ntest::timeout(100)]
fn test_render_to_appends() {
    let engine = get_engine(&[("t", "Hi {{name}}")]);
    let mut out = String::from("> ");

    engine.render_to("t", person(), &mut out).unwrap();
    engine.render_to("t", person(), &mut out).unwrap();
    assert_eq!(out, "> Hi EdgarHi Edgar");
}

#[test]
#[ntest::timeout(100)]
fn test_compiled_template_renders_repeatedly() {
    let engine = get_engine(&[]);
    let template = engine.compile_template("inline", "{{#a}}{{b}}{{/a}}").unwrap();

    let data = Value::map([("a", Value::map([("b", "1")]))]);
    let first = template.render(&engine, data.clone()).unwrap();
    let second = template.render(&engine, data).unwrap();
    assert_eq!(first, "1");
    assert_eq!(first, second);
    assert_eq!(engine.cached_templates(), 0, "compile_template does not cache");
}

#[test]
#[ntest::timeout(100)]
fn test_debug_string() {
    let engine = get_engine(&[]);
    let template = engine.compile_template("t", "Hi {{name}}\n{{#s}}x{{/s}}").unwrap();

    let debug = template.debug_string();
    let mut lines = debug.lines();
    assert_eq!(lines.next(), Some(format!("TEMPLATE t #{}", template.id()).as_str()));
    assert!(debug.contains("TEXT"), "{debug}");
    assert!(debug.contains("VALUE name"), "{debug}");
    assert!(debug.contains("SECTION s"), "{debug}");
}

#[test]
#[ntest::timeout(100)]
fn test_template_source() {
    let engine = get_engine(&[("t", "Hi {{name}}")]);

    assert_eq!(engine.get_template_source("t").unwrap().as_deref(), Some("Hi {{name}}"));
    assert_eq!(engine.get_template_source("missing").unwrap(), None);
}

#[test]
#[ntest::timeout(1000)]
fn test_template_cache_expiration() {
    let configuration = Configuration {
        template_cache_expiration_timeout_ms: Some(20),
        ..Configuration::default()
    };
    let engine = get_engine_with(configuration, &[("t", "x")]);

    let first = engine.get_template("t").unwrap();
    assert!(Arc::ptr_eq(&first, &engine.get_template("t").unwrap()));
    std::thread::sleep(Duration::from_millis(40));
    let second = engine.get_template("t").unwrap();
    assert_ne!(first.id(), second.id(), "expired template is compiled again");
}
