//! Step-to-plan compilation.
//!
//! `Compiler::compile` is one exhaustive match over [`Step`]. Each arm
//! compiles its origin (or takes the environment's placeholder), applies its
//! own operation and hands back the new plan together with the environment
//! later steps in the same branch will see.

use linkedql_quadstore::EdgeDirection;
use tracing::{debug, trace};

use crate::config::ExecutionConfig;
use crate::env::Environment;
use crate::error::{LinkedQlError, Result};
use crate::filter::{CompareOp, TextMatcher};
use crate::materialize::Shape;
use crate::plan::{AnchorId, HopDirection, HopState, Plan, PlanNode};
use crate::step::Step;
use crate::value::Value;

type Origin = Option<Box<Step>>;

/// A compiled query: the plan plus the result shape requested at its root.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub plan: Plan,
    pub shape: Shape,
    /// Tags bound at the root, oldest first.
    pub tags: Vec<String>,
}

impl CompiledQuery {
    pub fn explain(&self) -> String {
        format!("{:?}\n{}", self.shape, self.plan.explain())
    }
}

pub struct Compiler<'c> {
    config: &'c ExecutionConfig,
    next_anchor: AnchorId,
}

impl<'c> Compiler<'c> {
    pub fn new(config: &'c ExecutionConfig) -> Self {
        Self {
            config,
            next_anchor: 0,
        }
    }

    /// Compile a whole query. Result shapes are only accepted here.
    pub fn compile_query(&mut self, step: &Step) -> Result<CompiledQuery> {
        let root = Environment::root();
        let (plan, env, shape) = match step {
            Step::Select { from, tags } => {
                let (plan, env) = self.origin(from, &root)?;
                if let Some(tags) = tags {
                    if let Some(missing) = tags.iter().find(|t| !env.contains(t)) {
                        return Err(LinkedQlError::UnresolvedTag(missing.clone()));
                    }
                }
                (plan, env, Shape::Tags(tags.clone()))
            }
            Step::SelectFirst { from } => {
                let (plan, env) = self.origin(from, &root)?;
                (plan, env, Shape::First)
            }
            Step::Documents { from } => {
                let (plan, env) = self.origin(from, &root)?;
                (plan, env, Shape::Documents)
            }
            other => {
                let (plan, env) = self.compile(other, &root)?;
                (plan, env, Shape::Values)
            }
        };
        let query = CompiledQuery {
            plan,
            shape,
            tags: env.names(),
        };
        debug!(
            root = step.kind(),
            shape = ?query.shape,
            tags = ?query.tags,
            "compiled linkedql query"
        );
        Ok(query)
    }

    pub fn compile(&mut self, step: &Step, env: &Environment) -> Result<(Plan, Environment)> {
        let compiled = match step {
            Step::Entities { identifiers } => {
                let values = identifiers
                    .iter()
                    .map(|id| id.to_value())
                    .collect::<Result<Vec<_>>>()?;
                (Plan::new(PlanNode::Fixed(values)), env.clone())
            }
            Step::Vertex { values } => {
                let plan = if values.is_empty() {
                    Plan::all_nodes()
                } else {
                    Plan::new(PlanNode::Fixed(values.clone()))
                };
                (plan, env.clone())
            }
            Step::Placeholder => (env.placeholder().clone(), env.clone()),

            Step::Visit { from, properties } => {
                self.hop(from, properties, HopDirection::Forward, env)?
            }
            Step::VisitReverse { from, properties } => {
                self.hop(from, properties, HopDirection::Backward, env)?
            }
            Step::Both { from, properties } => {
                self.hop(from, properties, HopDirection::Both, env)?
            }

            Step::Back { from, tag: None } => {
                let (plan, env) = self.origin(from, env)?;
                if plan.hop_state() == HopState::Absent {
                    return Err(LinkedQlError::malformed(
                        "Back has no preceding traversal to undo",
                    ));
                }
                (Plan::new(PlanNode::Back { from: plan }), env)
            }
            Step::Back {
                from,
                tag: Some(tag),
            } => {
                let (plan, env) = self.origin(from, env)?;
                if !env.contains(tag) {
                    return Err(LinkedQlError::UnresolvedTag(tag.clone()));
                }
                let plan = Plan::new(PlanNode::BackTo {
                    from: plan,
                    tag: tag.clone(),
                });
                (plan, env)
            }

            Step::Properties { from, names } => {
                self.properties(from, names, EdgeDirection::Forward, env)?
            }
            Step::ReverseProperties { from, names } => {
                self.properties(from, names, EdgeDirection::Backward, env)?
            }
            Step::PropertyNames { from } => {
                self.property_names(from, EdgeDirection::Forward, env)?
            }
            Step::ReversePropertyNames { from } => {
                self.property_names(from, EdgeDirection::Backward, env)?
            }
            Step::PropertyNamesAs { from, tag } => {
                self.property_names_as(from, tag, EdgeDirection::Forward, env)?
            }
            Step::ReversePropertyNamesAs { from, tag } => {
                self.property_names_as(from, tag, EdgeDirection::Backward, env)?
            }

            Step::Has {
                from,
                property,
                values,
            } => self.has(from, property, values, EdgeDirection::Forward, env)?,
            Step::HasReverse {
                from,
                property,
                values,
            } => self.has(from, property, values, EdgeDirection::Backward, env)?,
            Step::Is { from, values } => {
                if values.is_empty() {
                    return Err(LinkedQlError::malformed("Is needs at least one value"));
                }
                let (plan, env) = self.origin(from, env)?;
                let plan = Plan::new(PlanNode::Is {
                    from: plan,
                    values: values.clone(),
                });
                (plan, env)
            }

            Step::Union { from, steps } => {
                let (plan, out_env) = self.origin(from, env)?;
                let branches = self.branches("Union", steps, env)?;
                (
                    Plan::new(PlanNode::Union {
                        from: plan,
                        branches,
                    }),
                    out_env,
                )
            }
            Step::Intersect { from, steps } => {
                let (plan, out_env) = self.origin(from, env)?;
                let branches = self.branches("Intersect", steps, env)?;
                (
                    Plan::new(PlanNode::Intersect {
                        from: plan,
                        branches,
                    }),
                    out_env,
                )
            }
            Step::Difference { from, steps } => {
                let (plan, out_env) = self.origin(from, env)?;
                let branches = self.branches("Difference", steps, env)?;
                (
                    Plan::new(PlanNode::Difference {
                        from: plan,
                        branches,
                    }),
                    out_env,
                )
            }

            Step::Filter { from, filter } => {
                let matcher = TextMatcher::compile(filter, self.config.regex_size_limit)?;
                let (plan, env) = self.origin(from, env)?;
                (Plan::new(PlanNode::Match { from: plan, matcher }), env)
            }
            Step::LessThan { from, value } => {
                self.compare(from, CompareOp::LessThan, value, env)?
            }
            Step::GreaterThan { from, value } => {
                self.compare(from, CompareOp::GreaterThan, value, env)?
            }
            Step::LessThanEquals { from, value } => {
                self.compare(from, CompareOp::LessThanEquals, value, env)?
            }
            Step::GreaterThanEquals { from, value } => {
                self.compare(from, CompareOp::GreaterThanEquals, value, env)?
            }

            Step::Count { from } => {
                let (plan, env) = self.origin(from, env)?;
                // Counting collapses every row, so no tag survives it.
                let env = Environment::root().with_placeholder(env.placeholder().clone());
                (Plan::new(PlanNode::Count { from: plan }), env)
            }
            Step::Limit { from, limit } => {
                let (plan, env) = self.origin(from, env)?;
                let plan = Plan::new(PlanNode::Limit {
                    from: plan,
                    limit: *limit,
                });
                (plan, env)
            }
            Step::Skip { from, offset } => {
                let (plan, env) = self.origin(from, env)?;
                let plan = Plan::new(PlanNode::Skip {
                    from: plan,
                    offset: *offset,
                });
                (plan, env)
            }
            Step::Unique { from } => {
                let (plan, env) = self.origin(from, env)?;
                (Plan::new(PlanNode::Unique { from: plan }), env)
            }
            Step::Order { from } => {
                let (plan, env) = self.origin(from, env)?;
                (Plan::new(PlanNode::Order { from: plan }), env)
            }

            Step::As { from, name } => {
                if name.is_empty() {
                    return Err(LinkedQlError::malformed("As needs a tag name"));
                }
                let (plan, env) = self.origin(from, env)?;
                let plan = Plan::new(PlanNode::Tag {
                    from: plan,
                    name: name.clone(),
                });
                let env = env.bind(name.clone(), plan.clone());
                (plan, env)
            }

            Step::Where { from, steps } => {
                if steps.is_empty() {
                    return Err(LinkedQlError::malformed("Where needs at least one step"));
                }
                let (plan, env) = self.origin(from, env)?;
                let anchor = self.anchor();
                let branch_env = env.with_placeholder(Plan::new(PlanNode::Anchor(anchor)));
                let mut exported = env.clone();
                let mut branches = Vec::with_capacity(steps.len());
                for step in steps {
                    let (branch, branch_out) = self.compile(step, &branch_env)?;
                    exported = exported.merge_exports(&branch_out);
                    branches.push(branch);
                }
                let plan = Plan::new(PlanNode::Where {
                    from: plan,
                    anchor,
                    branches,
                });
                (plan, exported)
            }
            Step::Optional { from, step } => {
                let (plan, env) = self.origin(from, env)?;
                let anchor = self.anchor();
                let branch_env = env.with_placeholder(Plan::new(PlanNode::Anchor(anchor)));
                let (branch, branch_out) = self.compile(step, &branch_env)?;
                let exported = env.merge_exports(&branch_out);
                let plan = Plan::new(PlanNode::Optional {
                    from: plan,
                    anchor,
                    branch,
                });
                (plan, exported)
            }
            Step::Follow { from, step } => {
                let (plan, env) = self.origin(from, env)?;
                let (plan, out) = self.compile(step, &env.with_placeholder(plan))?;
                (plan, out.with_placeholder(env.placeholder().clone()))
            }

            Step::Select { .. } | Step::SelectFirst { .. } | Step::Documents { .. } => {
                return Err(LinkedQlError::malformed(format!(
                    "{} is a result shape and may only appear at the root of a query",
                    step.kind()
                )));
            }
        };
        trace!(step = step.kind(), "compiled step");
        Ok(compiled)
    }

    fn origin(&mut self, from: &Origin, env: &Environment) -> Result<(Plan, Environment)> {
        match from {
            Some(step) => self.compile(step, env),
            None => Ok((env.placeholder().clone(), env.clone())),
        }
    }

    fn anchor(&mut self) -> AnchorId {
        let id = self.next_anchor;
        self.next_anchor += 1;
        id
    }

    /// Compile set-algebra branches against the step's own environment.
    /// Tags bound inside them are not exported.
    fn branches(
        &mut self,
        kind: &'static str,
        steps: &[Step],
        env: &Environment,
    ) -> Result<Vec<Plan>> {
        if steps.is_empty() {
            return Err(LinkedQlError::malformed(format!(
                "{kind} needs at least one step"
            )));
        }
        steps
            .iter()
            .map(|step| self.compile(step, env).map(|(plan, _)| plan))
            .collect()
    }

    fn hop(
        &mut self,
        from: &Origin,
        properties: &Step,
        direction: HopDirection,
        env: &Environment,
    ) -> Result<(Plan, Environment)> {
        let (plan, out) = self.origin(from, env)?;
        let (via, _) = self.compile(properties, env)?;
        let plan = Plan::new(PlanNode::Hop {
            from: plan,
            via,
            direction,
        });
        Ok((plan, out))
    }

    fn properties(
        &mut self,
        from: &Origin,
        names: &[String],
        direction: EdgeDirection,
        env: &Environment,
    ) -> Result<(Plan, Environment)> {
        if names.is_empty() {
            return Err(LinkedQlError::malformed(
                "Properties needs at least one property name",
            ));
        }
        let (mut plan, mut env) = self.origin(from, env)?;
        for name in names {
            plan = Plan::new(PlanNode::Save {
                from: plan,
                predicate: Value::iri(name.clone()),
                direction,
                tag: name.clone(),
            });
            env = env.bind(name.clone(), plan.clone());
        }
        Ok((plan, env))
    }

    fn property_names(
        &mut self,
        from: &Origin,
        direction: EdgeDirection,
        env: &Environment,
    ) -> Result<(Plan, Environment)> {
        let (plan, env) = self.origin(from, env)?;
        let names = Plan::new(PlanNode::PredicateNames {
            from: plan,
            direction,
        });
        Ok((Plan::new(PlanNode::Unique { from: names }), env))
    }

    fn property_names_as(
        &mut self,
        from: &Origin,
        tag: &str,
        direction: EdgeDirection,
        env: &Environment,
    ) -> Result<(Plan, Environment)> {
        let (plan, env) = self.origin(from, env)?;
        let plan = Plan::new(PlanNode::SavePredicates {
            from: plan,
            direction,
            tag: tag.to_string(),
        });
        let env = env.bind(tag, plan.clone());
        Ok((plan, env))
    }

    fn has(
        &mut self,
        from: &Origin,
        property: &Step,
        values: &[Value],
        direction: EdgeDirection,
        env: &Environment,
    ) -> Result<(Plan, Environment)> {
        if values.is_empty() {
            return Err(LinkedQlError::malformed("Has needs at least one value"));
        }
        let (plan, out) = self.origin(from, env)?;
        let (via, _) = self.compile(property, env)?;
        let plan = Plan::new(PlanNode::Has {
            from: plan,
            via,
            values: values.to_vec(),
            direction,
        });
        Ok((plan, out))
    }

    fn compare(
        &mut self,
        from: &Origin,
        op: CompareOp,
        value: &Value,
        env: &Environment,
    ) -> Result<(Plan, Environment)> {
        op.check_operand(value)?;
        let (plan, env) = self.origin(from, env)?;
        let plan = Plan::new(PlanNode::Compare {
            from: plan,
            op,
            value: value.clone(),
        });
        Ok((plan, env))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(step: &Step) -> Result<CompiledQuery> {
        Compiler::new(&ExecutionConfig::default()).compile_query(step)
    }

    #[test]
    fn nested_result_shapes_are_rejected() {
        let step = Step::all().select().limit(1);
        let err = compile(&step).unwrap_err();
        assert!(matches!(err, LinkedQlError::MalformedStep(_)));
    }

    #[test]
    fn back_without_traversal_is_rejected() {
        let err = compile(&Step::all().tag("x").back()).unwrap_err();
        assert!(matches!(err, LinkedQlError::MalformedStep(_)));
    }

    #[test]
    fn select_whitelist_must_be_bound() {
        let err = compile(&Step::all().tag("x").select_tags(["y"])).unwrap_err();
        assert!(matches!(err, LinkedQlError::UnresolvedTag(t) if t == "y"));
    }

    #[test]
    fn where_exports_branch_tags() {
        let step = Step::all()
            .where_(vec![Step::placeholder()
                .visit(Step::iris(["likes"]))
                .tag("liked")])
            .tag("person");
        let query = compile(&step).unwrap();
        assert_eq!(query.tags, vec!["liked".to_string(), "person".to_string()]);
    }

    #[test]
    fn union_branches_do_not_export_tags() {
        let step = Step::all().union(vec![Step::all().tag("hidden")]);
        let query = compile(&step).unwrap();
        assert!(query.tags.is_empty());
    }

    #[test]
    fn count_drops_bindings() {
        let err = compile(&Step::all().tag("x").count().back_to("x")).unwrap_err();
        assert!(matches!(err, LinkedQlError::UnresolvedTag(_)));
    }

    #[test]
    fn explain_lists_every_operator() {
        let step = Step::vertex(vec![Value::iri("alice")])
            .visit(Step::iris(["likes"]))
            .order();
        let text = compile(&step).unwrap().explain();
        assert!(text.contains("order [breaker]"));
        assert!(text.contains("hop Forward"));
        assert!(text.contains("fixed [<alice>]"));
    }
}
