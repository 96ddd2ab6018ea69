#[cfg(test)]
mod routing_policy_tests {
    use async_trait::async_trait;
    use deskserver::routing::{suggest_routing, RoutingAdvisor, RoutingCandidate};
    use deskserver::shared::enums::TicketPriority;
    use deskserver::shared::error::ApiError;
    use uuid::Uuid;

    struct ScriptedAdvisor {
        reply: Result<String, String>,
    }

    #[async_trait]
    impl RoutingAdvisor for ScriptedAdvisor {
        async fn generate(
            &self,
            _prompt: &str,
        ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(msg) => Err(msg.clone().into()),
            }
        }
    }

    fn replies(text: &str) -> ScriptedAdvisor {
        ScriptedAdvisor {
            reply: Ok(text.to_string()),
        }
    }

    fn unreachable() -> ScriptedAdvisor {
        ScriptedAdvisor {
            reply: Err("connection refused".to_string()),
        }
    }

    fn candidates(names: &[&str]) -> Vec<RoutingCandidate> {
        names
            .iter()
            .map(|name| RoutingCandidate {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: Some(format!("{name} department")),
            })
            .collect()
    }

    #[tokio::test]
    async fn well_formed_reply_is_applied() {
        let list = candidates(&["IT Support", "Human Resources"]);
        let advisor = replies(
            r#"Sure, here is my assessment: {"department_name": "IT Support",
            "confidence_score": 0.92, "reasoning": "hardware failure",
            "suggested_priority": "high", "suggested_tags": ["hardware", "laptop"]}"#,
        );

        let suggestion = suggest_routing(&advisor, "Laptop broken", "Screen cracked", &list)
            .await
            .unwrap();

        assert_eq!(suggestion.department_id, list[0].id);
        assert_eq!(suggestion.department_name, "IT Support");
        assert!((suggestion.confidence_score - 0.92).abs() < 1e-9);
        assert_eq!(suggestion.reasoning, "hardware failure");
        assert_eq!(suggestion.suggested_priority, TicketPriority::High);
        assert_eq!(
            suggestion.suggested_tags,
            vec!["hardware".to_string(), "laptop".to_string()]
        );
    }

    #[tokio::test]
    async fn department_name_matches_case_insensitively() {
        let list = candidates(&["IT Support", "Human Resources"]);
        let advisor = replies(
            r#"{"department_name": "human resources", "confidence_score": 0.7,
            "reasoning": "", "suggested_priority": "normal"}"#,
        );

        let suggestion = suggest_routing(&advisor, "Payroll question", "Missing payslip", &list)
            .await
            .unwrap();

        assert_eq!(suggestion.department_id, list[1].id);
        assert_eq!(suggestion.department_name, "Human Resources");
        assert!(suggestion.suggested_tags.is_empty());
    }

    #[tokio::test]
    async fn unreachable_advisor_falls_back_to_first_department() {
        let list = candidates(&["Facilities", "IT Support", "Legal"]);
        let advisor = unreachable();

        let suggestion = suggest_routing(&advisor, "Door broken", "Lock jammed", &list)
            .await
            .unwrap();

        assert_eq!(suggestion.department_id, list[0].id);
        assert_eq!(suggestion.department_name, "Facilities");
        assert!((suggestion.confidence_score - 0.5).abs() < 1e-9);
        assert_eq!(suggestion.suggested_priority, TicketPriority::Normal);
        assert!(suggestion.suggested_tags.is_empty());
        assert!(!suggestion.reasoning.is_empty());
    }

    #[tokio::test]
    async fn garbage_reply_falls_back() {
        let list = candidates(&["Facilities", "IT Support"]);
        let advisor = replies("I could not decide, sorry. No structured answer today.");

        let suggestion = suggest_routing(&advisor, "Window stuck", "Cannot open it", &list)
            .await
            .unwrap();

        assert_eq!(suggestion.department_id, list[0].id);
        assert!((suggestion.confidence_score - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_department_name_falls_back() {
        let list = candidates(&["Facilities", "IT Support"]);
        let advisor = replies(
            r#"{"department_name": "Space Operations", "confidence_score": 0.99,
            "reasoning": "orbital issue", "suggested_priority": "urgent"}"#,
        );

        let suggestion = suggest_routing(&advisor, "Satellite down", "No signal", &list)
            .await
            .unwrap();

        assert_eq!(suggestion.department_id, list[0].id);
        assert_eq!(suggestion.suggested_priority, TicketPriority::Normal);
    }

    #[tokio::test]
    async fn out_of_range_confidence_falls_back() {
        let list = candidates(&["Facilities", "IT Support"]);
        let advisor = replies(
            r#"{"department_name": "IT Support", "confidence_score": 1.7,
            "reasoning": "very sure", "suggested_priority": "low"}"#,
        );

        let suggestion = suggest_routing(&advisor, "Mouse broken", "Left click dead", &list)
            .await
            .unwrap();

        assert_eq!(suggestion.department_id, list[0].id);
        assert!((suggestion.confidence_score - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_candidate_list_is_rejected() {
        let advisor = replies(r#"{"department_name": "IT Support"}"#);
        let result = suggest_routing(&advisor, "Anything", "At all", &[]).await;
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn suggestion_always_names_a_supplied_department() {
        let list = candidates(&["Facilities", "IT Support", "Legal"]);
        let ids: Vec<Uuid> = list.iter().map(|c| c.id).collect();

        let scripted = [
            r#"{"department_name": "Legal", "confidence_score": 0.4, "reasoning": "contract", "suggested_priority": "low"}"#,
            r#"{"department_name": "nowhere", "confidence_score": 0.4, "reasoning": "?", "suggested_priority": "low"}"#,
            r#"{"department_name": "IT Support", "confidence_score": -3.0, "reasoning": "?", "suggested_priority": "low"}"#,
            r#"{"department_name": "IT Support", "confidence_score": 0.4, "reasoning": "?", "suggested_priority": "sideways"}"#,
            "not json",
        ];

        for reply in scripted {
            let advisor = replies(reply);
            let suggestion = suggest_routing(&advisor, "Subject", "Body", &list)
                .await
                .unwrap();
            assert!(
                ids.contains(&suggestion.department_id),
                "suggestion left the candidate list for reply: {reply}"
            );
        }
    }
}
